//! Command framing
//!
//! A user command is sent as one input line followed by two trailer
//! statements that print the boundary token, once to stdout and once to
//! stderr:
//!
//! ```text
//! <cmd>; echo '<token>'; [Console]::Error.WriteLine('<token>')\r\n
//! ```

/// PowerShell's line terminator on both input and output
pub const NEWLINE: &str = "\r\n";

/// Statement that ends the session
pub const EXIT_LINE: &str = "exit\r\n";

/// Build the line written to the shell for `command`
pub fn frame_command(command: &str, boundary: &str) -> String {
    format!(
        "{}; echo '{}'; [Console]::Error.WriteLine('{}'){}",
        command, boundary, boundary, NEWLINE
    )
}

/// What each reader waits for at the end of its stream
pub fn boundary_marker(boundary: &str) -> String {
    format!("{}{}", boundary, NEWLINE)
}
