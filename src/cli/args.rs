//! Argument parsing
//!
//! Parsing is two passes. The first lexes argv (via `clap_lex`) into tokens
//! against the closed set of [`CliOption`]s. The second folds the tokens in
//! their original order into [`ParsedArguments::values`], so for any
//! `--x` / `--no-x` pair the spelling that came last wins.

use std::collections::BTreeMap;
use std::ffi::OsStr;

use clap::{Arg, ArgAction, Command};
use clap_lex::RawArgs;
use serde::Serialize;

use super::Script;
use crate::error::ArgsError;

/// Every flag the CLI understands; each one is negatable with `--no-`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CliOption {
    Verbose,
    Color,
    Logfile,
    Watch,
}

/// Whether an option is a switch or carries a string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Boolean,
    String,
}

impl CliOption {
    pub const ALL: [CliOption; 4] = [
        CliOption::Verbose,
        CliOption::Color,
        CliOption::Logfile,
        CliOption::Watch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CliOption::Verbose => "verbose",
            CliOption::Color => "color",
            CliOption::Logfile => "logfile",
            CliOption::Watch => "watch",
        }
    }

    pub fn negated_name(self) -> &'static str {
        match self {
            CliOption::Verbose => "no-verbose",
            CliOption::Color => "no-color",
            CliOption::Logfile => "no-logfile",
            CliOption::Watch => "no-watch",
        }
    }

    pub fn kind(self) -> OptionKind {
        match self {
            CliOption::Logfile => OptionKind::String,
            _ => OptionKind::Boolean,
        }
    }

    fn help(self) -> &'static str {
        match self {
            CliOption::Verbose => "Enable verbose output",
            CliOption::Color => "Force colored output",
            CliOption::Logfile => "Write logs to a file",
            CliOption::Watch => "Run tests in watch mode (test only)",
        }
    }

    /// Look up a long flag name, returning the option and whether it was negated
    pub fn from_flag(name: &str) -> Option<(CliOption, bool)> {
        Self::ALL.into_iter().find_map(|option| {
            if name == option.name() {
                Some((option, false))
            } else if name == option.negated_name() {
                Some((option, true))
            } else {
                None
            }
        })
    }
}

/// Resolved value of an option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    String(String),
}

/// One lexed argument, with its position in argv
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Option {
        index: usize,
        option: CliOption,
        negated: bool,
        value: Option<String>,
    },
    Positional {
        index: usize,
        value: String,
    },
    /// Flag not in [`CliOption`], only kept when parsing is lenient
    Unknown {
        index: usize,
        raw: String,
    },
    /// The `--` separator
    Terminator {
        index: usize,
    },
}

/// Parser behavior switches
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Reject flags that are not declared
    pub strict: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// Result of parsing argv
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArguments {
    /// Reconciled option values
    pub values: BTreeMap<CliOption, OptionValue>,

    /// Positional tokens before any `--`
    pub positionals: Vec<String>,

    /// Tokens in argv order
    pub tokens: Vec<Token>,

    /// Arguments after `--`, forwarded untouched
    pub passthrough: Vec<String>,

    /// The script named by the positionals
    pub script: Script,
}

impl ParsedArguments {
    /// Value of a boolean option, if it was given
    pub fn flag(&self, option: CliOption) -> Option<bool> {
        match self.values.get(&option) {
            Some(OptionValue::Bool(value)) => Some(*value),
            Some(OptionValue::String(_)) => Some(true),
            None => None,
        }
    }

    /// Value of a string option, if it was given and not negated
    pub fn string(&self, option: CliOption) -> Option<&str> {
        match self.values.get(&option) {
            Some(OptionValue::String(value)) => Some(value),
            _ => None,
        }
    }

    /// Re-render the reconciled options as canonical flags, minus `skip`
    pub fn forwarded_flags(&self, skip: &[CliOption]) -> Vec<String> {
        let mut flags = Vec::new();
        for (option, value) in self.values.iter().filter(|(option, _)| !skip.contains(option)) {
            match value {
                OptionValue::Bool(true) => flags.push(format!("--{}", option.name())),
                OptionValue::Bool(false) => flags.push(format!("--{}", option.negated_name())),
                OptionValue::String(value) => {
                    flags.push(format!("--{}", option.name()));
                    flags.push(value.clone());
                }
            }
        }
        flags
    }
}

/// Clap description of the CLI, used for help and version output
pub fn command() -> Command {
    let mut cmd = Command::new("kickstart")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Zero-config build, start and test commands for frontend projects")
        .arg(
            Arg::new("script")
                .value_name("SCRIPT")
                .value_parser(Script::ALL.map(Script::name))
                .help("Script to run"),
        );

    for option in CliOption::ALL {
        let positive = Arg::new(option.name()).long(option.name()).help(option.help());
        let positive = match option.kind() {
            OptionKind::Boolean => positive.action(ArgAction::SetTrue),
            OptionKind::String => positive.action(ArgAction::Set).value_name("PATH"),
        };
        cmd = cmd.arg(positive).arg(
            Arg::new(option.negated_name())
                .long(option.negated_name())
                .action(ArgAction::SetTrue)
                .hide(true),
        );
    }

    cmd
}

/// Parse argv (without the executable) into [`ParsedArguments`]
pub fn parse_arguments<I, S>(argv: I, options: ParseOptions) -> Result<ParsedArguments, ArgsError>
where
    I: IntoIterator<Item = S>,
    S: Into<std::ffi::OsString>,
{
    let tokens = lex(argv, options)?;
    let values = reconcile(&tokens);

    let mut positionals = Vec::new();
    let mut passthrough = Vec::new();
    let mut terminated = false;
    for token in &tokens {
        match token {
            Token::Terminator { .. } => terminated = true,
            Token::Positional { value, .. } if terminated => passthrough.push(value.clone()),
            Token::Positional { value, .. } => positionals.push(value.clone()),
            _ => {}
        }
    }

    let script = select_script(&positionals)?;

    Ok(ParsedArguments {
        values,
        positionals,
        tokens,
        passthrough,
        script,
    })
}

/// First pass: split argv into tokens
fn lex<I, S>(argv: I, options: ParseOptions) -> Result<Vec<Token>, ArgsError>
where
    I: IntoIterator<Item = S>,
    S: Into<std::ffi::OsString>,
{
    let raw = RawArgs::new(argv);
    let mut cursor = raw.cursor();
    let mut tokens = Vec::new();
    let mut index = 0;

    while let Some(arg) = raw.next(&mut cursor) {
        let current = index;
        index += 1;

        if arg.is_escape() {
            tokens.push(Token::Terminator { index: current });
            for rest in raw.remaining(&mut cursor) {
                tokens.push(Token::Positional {
                    index,
                    value: utf8(rest)?,
                });
                index += 1;
            }
            break;
        }

        if let Some((name, inline)) = arg.to_long() {
            let name = name.map_err(|name| ArgsError::InvalidUtf8 {
                token: name.to_string_lossy().into_owned(),
            })?;
            let raw_token = format!("--{}", name);

            match name {
                "help" => return Err(ArgsError::Display(command().render_long_help().to_string())),
                "version" => return Err(ArgsError::Display(command().render_version())),
                _ => {}
            }

            let Some((option, negated)) = CliOption::from_flag(name) else {
                if options.strict {
                    return Err(ArgsError::UnknownFlag { token: raw_token });
                }
                tokens.push(Token::Unknown {
                    index: current,
                    raw: utf8(arg.to_value_os())?,
                });
                continue;
            };

            let value = match (option.kind(), negated) {
                (OptionKind::String, false) => match inline {
                    Some(value) => Some(utf8(value)?),
                    None => {
                        let next = raw
                            .next_os(&mut cursor)
                            .ok_or_else(|| ArgsError::MissingValue { token: raw_token.clone() })?;
                        let next = utf8(next)?;
                        // `--logfile --no-color` is a forgotten value, not a file named `--no-color`
                        if options.strict && next.starts_with('-') {
                            return Err(ArgsError::MissingValue { token: raw_token });
                        }
                        index += 1;
                        Some(next)
                    }
                },
                // Switches and negations never take a value
                _ if inline.is_some() && options.strict => {
                    return Err(ArgsError::UnknownFlag {
                        token: utf8(arg.to_value_os())?,
                    })
                }
                _ => None,
            };

            tokens.push(Token::Option {
                index: current,
                option,
                negated,
                value,
            });
            continue;
        }

        if arg.is_short() {
            let token = utf8(arg.to_value_os())?;
            match token.as_str() {
                "-h" => return Err(ArgsError::Display(command().render_help().to_string())),
                "-V" => return Err(ArgsError::Display(command().render_version())),
                _ if options.strict => return Err(ArgsError::UnknownFlag { token }),
                _ => tokens.push(Token::Unknown {
                    index: current,
                    raw: token,
                }),
            }
            continue;
        }

        tokens.push(Token::Positional {
            index: current,
            value: utf8(arg.to_value_os())?,
        });
    }

    Ok(tokens)
}

/// Second pass: fold option tokens in argv order, last spelling wins
fn reconcile(tokens: &[Token]) -> BTreeMap<CliOption, OptionValue> {
    tokens.iter().fold(BTreeMap::new(), |mut values, token| {
        if let Token::Option {
            option,
            negated,
            value,
            ..
        } = token
        {
            let resolved = match (negated, value) {
                (true, _) => OptionValue::Bool(false),
                (false, Some(value)) => OptionValue::String(value.clone()),
                (false, None) => OptionValue::Bool(true),
            };
            values.insert(*option, resolved);
        }
        values
    })
}

/// Validate positionals: exactly one known script
fn select_script(positionals: &[String]) -> Result<Script, ArgsError> {
    let mut script = None;

    for token in positionals {
        match (Script::from_name(token), script) {
            (Some(found), None) => script = Some(found),
            (Some(_), Some(_)) => {
                return Err(ArgsError::ExtraScript {
                    token: token.clone(),
                })
            }
            (None, _) => {
                return Err(ArgsError::UnknownScript {
                    token: token.clone(),
                })
            }
        }
    }

    script.ok_or(ArgsError::MissingScript)
}

fn utf8(value: &OsStr) -> Result<String, ArgsError> {
    value
        .to_str()
        .map(str::to_string)
        .ok_or_else(|| ArgsError::InvalidUtf8 {
            token: value.to_string_lossy().into_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(argv: &[&str]) -> Result<ParsedArguments, ArgsError> {
        parse_arguments(argv.iter().copied(), ParseOptions::default())
    }

    fn lenient(argv: &[&str]) -> Result<ParsedArguments, ArgsError> {
        parse_arguments(argv.iter().copied(), ParseOptions { strict: false })
    }

    #[test]
    fn test_script_and_flags() {
        let parsed = parse(&["build", "--verbose", "--logfile", "build.log"]).unwrap();

        assert_eq!(parsed.script, Script::Build);
        assert_eq!(parsed.positionals, vec!["build".to_string()]);
        assert_eq!(parsed.flag(CliOption::Verbose), Some(true));
        assert_eq!(parsed.string(CliOption::Logfile), Some("build.log"));
        assert_eq!(parsed.flag(CliOption::Color), None);
    }

    #[test]
    fn test_negation_after_positive_wins() {
        let parsed = parse(&["start", "--color", "--no-color"]).unwrap();
        assert_eq!(parsed.flag(CliOption::Color), Some(false));
    }

    #[test]
    fn test_positive_after_negation_wins() {
        let parsed = parse(&["--no-verbose", "test", "--verbose"]).unwrap();
        assert_eq!(parsed.flag(CliOption::Verbose), Some(true));
    }

    #[test]
    fn test_last_of_many_wins() {
        let parsed = parse(&["build", "--verbose", "--no-verbose", "--verbose", "--no-verbose"]).unwrap();
        assert_eq!(parsed.flag(CliOption::Verbose), Some(false));
    }

    #[test]
    fn test_logfile_negation() {
        let parsed = parse(&["build", "--logfile=a.log", "--no-logfile"]).unwrap();
        assert_eq!(parsed.string(CliOption::Logfile), None);
        assert_eq!(parsed.values.get(&CliOption::Logfile), Some(&OptionValue::Bool(false)));

        let parsed = parse(&["build", "--no-logfile", "--logfile", "b.log"]).unwrap();
        assert_eq!(parsed.string(CliOption::Logfile), Some("b.log"));
    }

    #[test]
    fn test_tokens_keep_argv_order() {
        let parsed = parse(&["--no-color", "build", "--logfile", "x.log", "--color"]).unwrap();
        assert_eq!(
            parsed.tokens,
            vec![
                Token::Option { index: 0, option: CliOption::Color, negated: true, value: None },
                Token::Positional { index: 1, value: "build".to_string() },
                Token::Option {
                    index: 2,
                    option: CliOption::Logfile,
                    negated: false,
                    value: Some("x.log".to_string()),
                },
                Token::Option { index: 4, option: CliOption::Color, negated: false, value: None },
            ]
        );
    }

    #[test]
    fn test_unknown_script() {
        let err = parse(&["deploy"]).unwrap_err();
        assert!(matches!(&err, ArgsError::UnknownScript { token } if token == "deploy"));
        assert_eq!(err.token(), Some("deploy"));
        assert!(err.to_string().contains("deploy"));
    }

    #[test]
    fn test_missing_script() {
        assert!(matches!(parse(&["--verbose"]), Err(ArgsError::MissingScript)));
    }

    #[test]
    fn test_second_script_is_rejected() {
        let err = parse(&["build", "test"]).unwrap_err();
        assert!(matches!(err, ArgsError::ExtraScript { token } if token == "test"));
    }

    #[test]
    fn test_unknown_flag_in_strict_mode() {
        let err = parse(&["build", "--bogus"]).unwrap_err();
        assert!(matches!(err, ArgsError::UnknownFlag { token } if token == "--bogus"));

        let err = parse(&["build", "-x"]).unwrap_err();
        assert!(matches!(err, ArgsError::UnknownFlag { token } if token == "-x"));
    }

    #[test]
    fn test_unknown_flag_kept_when_lenient() {
        let parsed = lenient(&["build", "--bogus=1", "--verbose"]).unwrap();
        assert_eq!(parsed.flag(CliOption::Verbose), Some(true));
        assert!(parsed
            .tokens
            .contains(&Token::Unknown { index: 1, raw: "--bogus=1".to_string() }));
    }

    #[test]
    fn test_missing_value() {
        let err = parse(&["build", "--logfile"]).unwrap_err();
        assert!(matches!(err, ArgsError::MissingValue { token } if token == "--logfile"));
    }

    #[test]
    fn test_flag_is_not_taken_as_value() {
        let err = parse(&["build", "--logfile", "--no-color"]).unwrap_err();
        assert!(matches!(err, ArgsError::MissingValue { ref token } if token == "--logfile"));

        let err = parse(&["build", "--logfile", "--", "x"]).unwrap_err();
        assert!(matches!(err, ArgsError::MissingValue { ref token } if token == "--logfile"));

        let parsed = parse(&["build", "--logfile=-odd.log"]).unwrap();
        assert_eq!(parsed.string(CliOption::Logfile), Some("-odd.log"));

        let parsed = lenient(&["build", "--logfile", "--no-color"]).unwrap();
        assert_eq!(parsed.string(CliOption::Logfile), Some("--no-color"));
    }

    #[test]
    fn test_passthrough_after_terminator() {
        let parsed = parse(&["test", "--", "--coverage", "src/App"]).unwrap();
        assert_eq!(parsed.script, Script::Test);
        assert_eq!(parsed.positionals, vec!["test".to_string()]);
        assert_eq!(parsed.passthrough, vec!["--coverage".to_string(), "src/App".to_string()]);
    }

    #[test]
    fn test_help_is_reported_for_display() {
        match parse(&["--help"]) {
            Err(ArgsError::Display(text)) => {
                assert!(text.contains("--verbose"));
                assert!(text.contains("build"));
            }
            other => panic!("expected help text, got {:?}", other),
        }
    }

    #[test]
    fn test_forwarded_flags_are_canonical() {
        let parsed = parse(&["test", "--color", "--logfile=out.log", "--no-color", "--verbose", "--watch"]).unwrap();
        assert_eq!(
            parsed.forwarded_flags(&[]),
            vec!["--verbose", "--no-color", "--logfile", "out.log", "--watch"]
        );
        assert_eq!(
            parsed.forwarded_flags(&[CliOption::Watch, CliOption::Logfile]),
            vec!["--verbose", "--no-color"]
        );
    }

    #[test]
    fn test_option_and_script_names_are_disjoint() {
        for option in CliOption::ALL {
            assert!(Script::from_name(option.name()).is_none());
            assert!(Script::from_name(option.negated_name()).is_none());
        }
    }

    #[test]
    fn test_clap_command_is_consistent() {
        command().debug_assert();
    }
}
