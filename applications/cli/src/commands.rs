/// Interactive commands read from stdin
use std::time::Duration;

/// Volume step for `+` / `-`
pub const VOLUME_STEP: f32 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Play when paused or stopped, pause when playing
    TogglePlay,
    Stop,
    Next,
    Back,
    ToggleMute,
    VolumeUp,
    VolumeDown,
    Seek(Duration),
    Status,
    Quit,
    Help,
}

impl Command {
    /// Parse one input line; `Err` carries a message for the user
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err("empty command".to_string());
        };

        let command = match head {
            "p" | "play" | "pause" => Self::TogglePlay,
            "s" | "stop" => Self::Stop,
            "n" | "next" => Self::Next,
            "b" | "back" => Self::Back,
            "m" | "mute" => Self::ToggleMute,
            "+" => Self::VolumeUp,
            "-" => Self::VolumeDown,
            "i" | "status" => Self::Status,
            "q" | "quit" => Self::Quit,
            "h" | "help" | "?" => Self::Help,
            "seek" => {
                let secs: f64 = words
                    .next()
                    .ok_or("usage: seek <seconds>")?
                    .parse()
                    .map_err(|_| "seek expects a number of seconds".to_string())?;
                if !secs.is_finite() || secs < 0.0 {
                    return Err("seek position must be a non-negative number".to_string());
                }
                Self::Seek(Duration::from_secs_f64(secs))
            }
            other => return Err(format!("unknown command '{other}' (h for help)")),
        };
        Ok(command)
    }
}

pub const HELP: &str = "\
commands:
  p          play / pause
  s          stop
  n / b      next / previous track
  m          mute / unmute
  + / -      volume up / down
  seek <s>   jump to position in seconds
  i          status
  q          quit";
