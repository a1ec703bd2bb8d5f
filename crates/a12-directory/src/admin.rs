//! Admin channel (§4.5 "Admin channel").
//!
//! An admin client submits a packed `key=value:...` command string; the
//! controller parses it into a nested table and invokes an `admin_command`
//! hook. The channel is bidirectional: the controller may also push status
//! reports and events to it unprompted.

use std::collections::HashMap;

use crate::error::DirectoryError;

/// A parsed admin command: the leading verb plus its remaining `key=value`
/// fields, grouped the way `dir_lua.c`'s admin dispatch expects (a command
/// name followed by a flat parameter table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCommand {
    verb: String,
    fields: HashMap<String, String>,
}

impl AdminCommand {
    /// The command verb (the first bare flag token).
    #[must_use]
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Looks up a `key=value` field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Parses a packed admin command string.
///
/// # Errors
///
/// `DirectoryError::MalformedAdminCommand` if the string contains no bare
/// verb token (every token was a `key=value` binding).
pub fn parse_admin_command(text: &str) -> Result<AdminCommand, DirectoryError> {
    let verb = text
        .split(':')
        .find(|token| !token.is_empty() && !token.contains('='))
        .ok_or_else(|| DirectoryError::MalformedAdminCommand(text.to_string()))?
        .to_string();

    let fields = text
        .split(':')
        .filter_map(|token| token.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    Ok(AdminCommand { verb, fields })
}

/// A hook invoked once an admin command has parsed successfully. Returns a
/// response string to push back to the admin channel.
pub trait AdminHook: Send {
    /// Handles one parsed admin command.
    ///
    /// # Errors
    ///
    /// Returns a [`DirectoryError`] describing why the command could not be
    /// carried out (e.g. `UnknownAppl` for a command naming a nonexistent
    /// appl).
    fn admin_command(&mut self, command: &AdminCommand) -> Result<String, DirectoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verb_and_fields() {
        let parsed = parse_admin_command("list_appls:format=json").unwrap();
        assert_eq!(parsed.verb(), "list_appls");
        assert_eq!(parsed.field("format"), Some("json"));
    }

    #[test]
    fn verb_only_command_parses() {
        let parsed = parse_admin_command("shutdown").unwrap();
        assert_eq!(parsed.verb(), "shutdown");
        assert_eq!(parsed.field("anything"), None);
    }

    #[test]
    fn no_verb_is_malformed() {
        let err = parse_admin_command("format=json:limit=10").unwrap_err();
        assert!(matches!(err, DirectoryError::MalformedAdminCommand(_)));
    }

    struct EchoHook;
    impl AdminHook for EchoHook {
        fn admin_command(&mut self, command: &AdminCommand) -> Result<String, DirectoryError> {
            Ok(command.verb().to_string())
        }
    }

    #[test]
    fn hook_receives_parsed_command() {
        let mut hook = EchoHook;
        let command = parse_admin_command("ping").unwrap();
        assert_eq!(hook.admin_command(&command).unwrap(), "ping");
    }
}
