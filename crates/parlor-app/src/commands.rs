//! Slash-command parsing for the interactive prompt.

use std::path::{Path, PathBuf};

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text: send it, together with any staged files.
    Send(String),
    /// `/new [extension]`
    New(Option<String>),
    /// `/switch <n|id>`
    Switch(String),
    /// `/close <n|id>`
    Close(String),
    Sessions,
    /// `/attach <path>`: stage a picked file for the next message.
    Attach(PathBuf),
    /// `/paste <path>`: stage a file as if pasted from the clipboard.
    Paste(PathBuf),
    Context,
    /// `/forget <n>`: drop a context item by position.
    Forget(usize),
    /// `/forget all`
    ForgetAll,
    Offline,
    Online,
    Seen,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

pub const HELP: &str = "\
Commands:
  <text>            send a message (with any staged files)
  /send             send staged files without text
  /attach <path>    stage a file for the next message
  /paste <path>     stage a file as a clipboard paste
  /new [extension]  start a new chat (farm, personal, bank, ...)
  /switch <n|id>    switch to a session by number or id prefix
  /close <n|id>     close a session
  /sessions         list sessions
  /context          list context items
  /forget <n|all>   remove a context item, or all of them
  /offline, /online simulate connection changes
  /seen             acknowledge new replies
  /quit             exit";

/// Parse one input line.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let arg = (!arg.is_empty()).then(|| arg.to_string());

    match (name.to_ascii_lowercase().as_str(), arg) {
        ("send", _) => Command::Send(String::new()),
        ("new", ext) => Command::New(ext),
        ("switch", Some(target)) => Command::Switch(target),
        ("close", Some(target)) => Command::Close(target),
        ("sessions", _) => Command::Sessions,
        ("attach", Some(path)) => Command::Attach(PathBuf::from(path)),
        ("paste", Some(path)) => Command::Paste(PathBuf::from(path)),
        ("context", _) => Command::Context,
        ("forget", Some(n)) if n.eq_ignore_ascii_case("all") => Command::ForgetAll,
        ("forget", Some(n)) => match n.parse::<usize>() {
            Ok(n) if n > 0 => Command::Forget(n),
            _ => Command::Invalid(format!("not a context item number: {}", n)),
        },
        ("offline", _) => Command::Offline,
        ("online", _) => Command::Online,
        ("seen", _) => Command::Seen,
        ("help", _) | ("?", _) => Command::Help,
        ("quit", _) | ("exit", _) => Command::Quit,
        (name, None) if matches!(name, "switch" | "close" | "attach" | "paste" | "forget") => {
            Command::Invalid(format!("/{} needs an argument", name))
        }
        (name, _) => Command::Invalid(format!("unknown command /{}", name)),
    }
}

/// Best-effort MIME type from a file extension.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_send() {
        assert_eq!(
            parse_command("  my tomato plants  "),
            Command::Send("my tomato plants".to_string())
        );
        assert_eq!(parse_command("   "), Command::Empty);
    }

    #[test]
    fn test_new_with_and_without_extension() {
        assert_eq!(parse_command("/new"), Command::New(None));
        assert_eq!(parse_command("/new farm"), Command::New(Some("farm".to_string())));
    }

    #[test]
    fn test_commands_with_arguments() {
        assert_eq!(parse_command("/switch 2"), Command::Switch("2".to_string()));
        assert_eq!(
            parse_command("/attach ./photos/leaf one.png"),
            Command::Attach(PathBuf::from("./photos/leaf one.png"))
        );
        assert_eq!(parse_command("/forget 1"), Command::Forget(1));
        assert_eq!(parse_command("/forget ALL"), Command::ForgetAll);
        assert_eq!(parse_command("/SEND"), Command::Send(String::new()));
    }

    #[test]
    fn test_missing_argument() {
        assert_eq!(
            parse_command("/switch"),
            Command::Invalid("/switch needs an argument".to_string())
        );
        assert!(matches!(parse_command("/forget zero"), Command::Invalid(_)));
        assert!(matches!(parse_command("/forget 0"), Command::Invalid(_)));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_command("/dance"),
            Command::Invalid("unknown command /dance".to_string())
        );
    }

    #[test]
    fn test_quit_aliases() {
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command("/exit"), Command::Quit);
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(Path::new("leaf.PNG")), "image/png");
        assert_eq!(guess_mime(Path::new("report.pdf")), "application/pdf");
        assert_eq!(guess_mime(Path::new("noext")), "application/octet-stream");
    }
}
