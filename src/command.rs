//! Query text -> [`ParsedCommand`].
//!
//! The first word picks the command; anything unrecognised falls back to
//! help so half-typed launcher input never shows an error.

use crate::core::task::DuePeriod;
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoginArgs {
    pub profile: String,
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub verify_tls: Option<bool>,
    pub default_list: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddArgs {
    pub title: String,
    pub list_name: Option<String>,
    pub due: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Login(LoginArgs),
    Use { profile: String },
    Add(AddArgs),
    Find { terms: String, page: u32 },
    Due { period: DuePeriod, page: u32 },
    Lists,
    Done { task_id: i64 },
    Open { task_id: i64 },
    Help,
}

impl ParsedCommand {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Login(_) => "login",
            Self::Use { .. } => "use",
            Self::Add(_) => "add",
            Self::Find { .. } => "find",
            Self::Due { .. } => "due",
            Self::Lists => "lists",
            Self::Done { .. } => "done",
            Self::Open { .. } => "open",
            Self::Help => "help",
        }
    }
}

pub fn parse_query(raw: &str) -> Result<ParsedCommand, ParseError> {
    let tokens = shell_words::split(raw.trim())
        .map_err(|e| ParseError::new(format!("Could not split query: {}", e)))?;
    let Some((first, rest)) = tokens.split_first() else {
        return Ok(ParsedCommand::Help);
    };

    match first.to_lowercase().as_str() {
        "login" => parse_login(rest),
        "use" => parse_use(rest),
        "add" => parse_add(rest),
        "find" => parse_find(rest),
        "due" => parse_due(rest),
        "lists" => Ok(ParsedCommand::Lists),
        "done" => parse_task_id("done", rest).map(|task_id| ParsedCommand::Done { task_id }),
        "open" => parse_task_id("open", rest).map(|task_id| ParsedCommand::Open { task_id }),
        _ => Ok(ParsedCommand::Help),
    }
}

fn parse_use(tokens: &[String]) -> Result<ParsedCommand, ParseError> {
    match tokens {
        [profile] => Ok(ParsedCommand::Use {
            profile: profile.clone(),
        }),
        [] => Err(ParseError::new("use expects a profile name")),
        _ => Err(ParseError::new("use expects exactly one profile name")),
    }
}

fn parse_login(tokens: &[String]) -> Result<ParsedCommand, ParseError> {
    let Some((profile, options)) = tokens.split_first() else {
        return Err(ParseError::new("login expects a profile name"));
    };
    let mut args = LoginArgs {
        profile: profile.clone(),
        ..LoginArgs::default()
    };

    let mut options = options.iter();
    while let Some(option) = options.next() {
        let key = option.to_lowercase();
        match key.as_str() {
            "--url" | "--base" | "--base-url" => {
                args.base_url = Some(expect_value(&mut options, &key)?)
            }
            "--token" => args.token = Some(expect_value(&mut options, &key)?),
            "--username" | "--user" => args.username = Some(expect_value(&mut options, &key)?),
            "--password" | "--pass" => args.password = Some(expect_value(&mut options, &key)?),
            "--verify-tls" | "--verify" => {
                args.verify_tls = Some(parse_bool(&expect_value(&mut options, &key)?)?)
            }
            "--default-list" | "--list" => {
                args.default_list = Some(expect_value(&mut options, &key)?)
            }
            _ => {
                return Err(ParseError::new(format!(
                    "Unknown option for login: {}",
                    option
                )));
            }
        }
    }

    Ok(ParsedCommand::Login(args))
}

fn parse_add(tokens: &[String]) -> Result<ParsedCommand, ParseError> {
    let Some((title, options)) = tokens.split_first() else {
        return Err(ParseError::new("add expects a task title"));
    };
    let mut args = AddArgs {
        title: title.clone(),
        list_name: None,
        due: None,
        description: None,
    };

    let mut options = options.iter();
    while let Some(option) = options.next() {
        let key = option.to_lowercase();
        match key.as_str() {
            "--list" => args.list_name = Some(expect_value(&mut options, &key)?),
            "--due" => args.due = Some(expect_value(&mut options, &key)?),
            "--desc" => args.description = Some(expect_value(&mut options, &key)?),
            _ => {
                return Err(ParseError::new(format!(
                    "Unknown option for add: {}",
                    option
                )));
            }
        }
    }

    Ok(ParsedCommand::Add(args))
}

fn parse_find(tokens: &[String]) -> Result<ParsedCommand, ParseError> {
    let mut terms: Vec<&str> = Vec::new();
    let mut page = 1;

    let mut tokens = tokens.iter();
    while let Some(token) = tokens.next() {
        if token == "--page" {
            page = parse_page(&expect_value(&mut tokens, "--page")?)?;
        } else {
            terms.push(token);
        }
    }

    if terms.is_empty() {
        return Err(ParseError::new("find expects search terms"));
    }
    Ok(ParsedCommand::Find {
        terms: terms.join(" "),
        page,
    })
}

fn parse_due(tokens: &[String]) -> Result<ParsedCommand, ParseError> {
    let Some((period, options)) = tokens.split_first() else {
        return Err(ParseError::new(
            "due expects a period (today, tomorrow, week)",
        ));
    };
    let period = DuePeriod::from_keyword(period)
        .ok_or_else(|| ParseError::new("due period must be today, tomorrow, or week"))?;

    let mut page = 1;
    let mut options = options.iter();
    while let Some(option) = options.next() {
        if option == "--page" {
            page = parse_page(&expect_value(&mut options, "--page")?)?;
        } else {
            return Err(ParseError::new(format!(
                "Unknown option for due: {}",
                option
            )));
        }
    }

    Ok(ParsedCommand::Due { period, page })
}

fn parse_task_id(command: &str, tokens: &[String]) -> Result<i64, ParseError> {
    let Some(raw) = tokens.first() else {
        return Err(ParseError::new(format!("{} expects a task id", command)));
    };
    raw.parse::<i64>()
        .map_err(|_| ParseError::new("Task id must be an integer"))
}

/// Page numbers below 1 clamp to 1; non-numbers are rejected.
fn parse_page(value: &str) -> Result<u32, ParseError> {
    let page: i64 = value
        .parse()
        .map_err(|_| ParseError::new("--page must be a positive integer"))?;
    Ok(page.clamp(1, u32::MAX as i64) as u32)
}

fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Ok(true),
        "false" | "0" | "no" | "n" | "off" => Ok(false),
        _ => Err(ParseError::new(format!("Invalid boolean value: {}", value))),
    }
}

fn expect_value<'a>(
    options: &mut impl Iterator<Item = &'a String>,
    key: &str,
) -> Result<String, ParseError> {
    options
        .next()
        .cloned()
        .ok_or_else(|| ParseError::new(format!("Option {} expects a value", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(query: &str) -> LoginArgs {
        match parse_query(query).unwrap() {
            ParsedCommand::Login(args) => args,
            other => panic!("expected login, got {:?}", other),
        }
    }

    #[test]
    fn login_with_token_and_options() {
        let args = login(
            "login personal --url https://vik.example --token secret --verify-tls false --default-list 42",
        );
        assert_eq!(args.profile, "personal");
        assert_eq!(args.base_url.as_deref(), Some("https://vik.example"));
        assert_eq!(args.token.as_deref(), Some("secret"));
        assert_eq!(args.verify_tls, Some(false));
        assert_eq!(args.default_list.as_deref(), Some("42"));
    }

    #[test]
    fn login_leaves_unset_fields_empty() {
        let args = login("login work --token abc --url https://vik.example");
        assert_eq!(args.profile, "work");
        assert_eq!(args.base_url.as_deref(), Some("https://vik.example"));
        assert_eq!(args.token.as_deref(), Some("abc"));
        assert_eq!(args.verify_tls, None);
        assert_eq!(args.username, None);

        let bare = login("login work --url https://vik.example");
        assert_eq!(bare.token, None);
    }

    #[test]
    fn login_flag_aliases() {
        let args = login("LOGIN home --base http://h --user me --pass pw --verify YES --list 3");
        assert_eq!(args.base_url.as_deref(), Some("http://h"));
        assert_eq!(args.username.as_deref(), Some("me"));
        assert_eq!(args.password.as_deref(), Some("pw"));
        assert_eq!(args.verify_tls, Some(true));
        assert_eq!(args.default_list.as_deref(), Some("3"));
    }

    #[test]
    fn login_rejects_bad_input() {
        assert!(parse_query("login").is_err());
        assert!(parse_query("login home --token").is_err());
        assert!(parse_query("login home --verify-tls maybe").is_err());

        let err = parse_query("login home --colour red").unwrap_err();
        assert!(err.0.contains("--colour"));
    }

    #[test]
    fn empty_and_unknown_fall_back_to_help() {
        assert_eq!(parse_query("").unwrap(), ParsedCommand::Help);
        assert_eq!(parse_query("   ").unwrap(), ParsedCommand::Help);
        assert_eq!(parse_query("frobnicate now").unwrap(), ParsedCommand::Help);
        assert_eq!(parse_query("help").unwrap(), ParsedCommand::Help);
    }

    #[test]
    fn use_needs_exactly_one_name() {
        assert_eq!(
            parse_query("use work").unwrap(),
            ParsedCommand::Use {
                profile: "work".into()
            }
        );
        assert!(parse_query("use").is_err());
        assert!(parse_query("use work home").is_err());
    }

    #[test]
    fn add_keeps_quoted_title_whole() {
        let parsed = parse_query(r#"add "Buy milk" --list Groceries --due 2026-12-31 --desc "2 litres""#)
            .unwrap();
        assert_eq!(
            parsed,
            ParsedCommand::Add(AddArgs {
                title: "Buy milk".into(),
                list_name: Some("Groceries".into()),
                due: Some("2026-12-31".into()),
                description: Some("2 litres".into()),
            })
        );
    }

    #[test]
    fn add_title_is_single_token() {
        assert!(parse_query("add").is_err());
        // The second word is not part of the title, so it reads as an unknown option.
        assert!(parse_query("add Buy milk").is_err());
        assert!(parse_query("add milk --list").is_err());
    }

    #[test]
    fn find_joins_terms_and_reads_page() {
        assert_eq!(
            parse_query("find overdue invoices --page 3").unwrap(),
            ParsedCommand::Find {
                terms: "overdue invoices".into(),
                page: 3
            }
        );
        assert_eq!(
            parse_query("find a --page 2 b").unwrap(),
            ParsedCommand::Find {
                terms: "a b".into(),
                page: 2
            }
        );
    }

    #[test]
    fn find_requires_terms() {
        assert!(parse_query("find").is_err());
        assert!(parse_query("find --page 2").is_err());
        assert!(parse_query("find x --page two").is_err());
        assert!(parse_query("find x --page").is_err());
    }

    #[test]
    fn find_page_clamps_to_one() {
        assert_eq!(
            parse_query("find x --page -4").unwrap(),
            ParsedCommand::Find {
                terms: "x".into(),
                page: 1
            }
        );
    }

    #[test]
    fn due_periods_and_pages() {
        assert_eq!(
            parse_query("due today --page 2").unwrap(),
            ParsedCommand::Due {
                period: DuePeriod::Today,
                page: 2
            }
        );
        assert_eq!(
            parse_query("due WEEK --page 0").unwrap(),
            ParsedCommand::Due {
                period: DuePeriod::Week,
                page: 1
            }
        );
        assert!(parse_query("due").is_err());
        assert!(parse_query("due someday").is_err());
        assert!(parse_query("due today --limit 5").is_err());
    }

    #[test]
    fn task_id_commands() {
        assert_eq!(
            parse_query("done 17").unwrap(),
            ParsedCommand::Done { task_id: 17 }
        );
        assert_eq!(
            parse_query("open 4").unwrap(),
            ParsedCommand::Open { task_id: 4 }
        );
        assert!(parse_query("done").is_err());
        assert!(parse_query("open abc").is_err());
    }

    #[test]
    fn lists_ignores_case() {
        assert_eq!(parse_query("Lists").unwrap(), ParsedCommand::Lists);
    }

    #[test]
    fn unbalanced_quotes_are_parse_errors() {
        assert!(parse_query(r#"add "Buy milk"#).is_err());
    }
}
