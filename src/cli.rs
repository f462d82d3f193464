use anyhow::{anyhow, bail, Context, Result};
use std::env;

/// Flags accepted by the demo binary. Every flag takes a value; the latest
/// occurrence wins.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOptions {
    pub config: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frames: Option<u32>,
    pub out: Option<String>,
}

impl CliOptions {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = CliOptions::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if !flag.starts_with("--") {
                bail!("Unexpected argument '{flag}'. Use --config/--width/--height/--frames/--out with values.");
            }
            let key = &flag[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => options.config = Some(value),
                "width" => {
                    options.width =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid width '{value}'"))?);
                }
                "height" => {
                    options.height =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid height '{value}'"))?);
                }
                "frames" => {
                    options.frames =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid frame count '{value}'"))?);
                }
                "out" => options.out = Some(value),
                _ => bail!("Unknown flag '{flag}'. Supported flags: --config, --width, --height, --frames, --out."),
            }
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_flags() {
        let args = [
            "app", "--config", "stage.json", "--width", "640", "--height", "480", "--frames", "10",
            "--out", "frame.png",
        ];
        let options = CliOptions::parse(args).expect("parse options");
        assert_eq!(options.config.as_deref(), Some("stage.json"));
        assert_eq!(options.width, Some(640));
        assert_eq!(options.height, Some(480));
        assert_eq!(options.frames, Some(10));
        assert_eq!(options.out.as_deref(), Some("frame.png"));
    }

    #[test]
    fn latest_flag_wins() {
        let args = ["app", "--width", "800", "--width", "1920"];
        let options = CliOptions::parse(args).expect("parse options");
        assert_eq!(options.width, Some(1920));
    }

    #[test]
    fn missing_value_errors() {
        let err = CliOptions::parse(["app", "--frames"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"), "error should mention missing value");
    }

    #[test]
    fn rejects_unknown_flags() {
        let err = CliOptions::parse(["app", "--foo", "bar"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"), "unknown flags should error");
    }
}
