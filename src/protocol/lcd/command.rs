use super::LcdError;

/// Split a command line into arguments.
///
/// Arguments are separated by spaces. An argument that starts with a double
/// or single quote runs until the matching quote and may contain spaces.
pub fn split_args(line: &str) -> Result<Vec<String>, LcdError> {
    let mut args = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_ascii_whitespace()).is_some() {}

        let Some(first) = chars.next() else {
            break;
        };

        let mut arg = String::new();

        if first == '"' || first == '\'' {
            loop {
                match chars.next() {
                    Some(c) if c == first => break,
                    Some(c) => arg.push(c),
                    None => return Err(LcdError::UnterminatedQuote),
                }
            }
        } else {
            arg.push(first);
            while let Some(c) = chars.next_if(|c| !c.is_ascii_whitespace()) {
                arg.push(c);
            }
        }

        args.push(arg);
    }

    Ok(args)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenSetting {
    Priority(i32),
    Name(String),
    Duration(i32),
}

/// Screen attributes that are accepted but have no effect here.
const IGNORED_SCREEN_KEYS: &[&str] = &[
    "heartbeat",
    "backlight",
    "cursor",
    "cursor_x",
    "cursor_y",
    "timeout",
    "wid",
    "hgt",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    String,
    Title,
    HBar,
}

impl std::str::FromStr for WidgetKind {
    type Err = LcdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(WidgetKind::String),
            "title" => Ok(WidgetKind::Title),
            "hbar" => Ok(WidgetKind::HBar),
            other => Err(LcdError::UnknownWidgetType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Hello,
    Noop,
    /// `client_set`, `client_add_key` and `client_del_key`
    ClientIgnored,
    ScreenAdd {
        screen: String,
    },
    ScreenDel {
        screen: String,
    },
    ScreenSet {
        screen: String,
        settings: Vec<ScreenSetting>,
    },
    WidgetAdd {
        screen: String,
        widget: String,
        kind: WidgetKind,
    },
    WidgetDel {
        screen: String,
        widget: String,
    },
    /// Arguments are interpreted according to the widget type.
    WidgetSet {
        screen: String,
        widget: String,
        args: Vec<String>,
    },
}

impl Request {
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Request::Hello | Request::Noop | Request::ClientIgnored)
    }
}

impl std::str::FromStr for Request {
    type Err = LcdError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut args = split_args(line)?.into_iter();
        let command = args.next().ok_or(LcdError::Empty)?;

        let mut next = |name: &'static str| args.next().ok_or(LcdError::MissingArgument(name));

        let request = match command.as_str() {
            "hello" => Request::Hello,
            "noop" => Request::Noop,
            "client_set" | "client_add_key" | "client_del_key" => Request::ClientIgnored,
            "screen_add" => Request::ScreenAdd {
                screen: next("screen")?,
            },
            "screen_del" => Request::ScreenDel {
                screen: next("screen")?,
            },
            "screen_set" => {
                let screen = next("screen")?;
                let settings = screen_settings(&mut args)?;
                Request::ScreenSet { screen, settings }
            }
            "widget_add" => Request::WidgetAdd {
                screen: next("screen")?,
                widget: next("widget")?,
                kind: next("type")?.parse()?,
            },
            "widget_del" => Request::WidgetDel {
                screen: next("screen")?,
                widget: next("widget")?,
            },
            "widget_set" => Request::WidgetSet {
                screen: next("screen")?,
                widget: next("widget")?,
                args: args.collect(),
            },
            other => return Err(LcdError::UnknownCommand(other.to_string())),
        };

        Ok(request)
    }
}

fn screen_settings<I>(args: &mut I) -> Result<Vec<ScreenSetting>, LcdError>
where
    I: Iterator<Item = String>,
{
    let mut settings = Vec::new();

    while let Some(key) = args.next() {
        let key = key.trim_start_matches('-').to_string();
        let value = args
            .next()
            .ok_or_else(|| LcdError::MissingValue(key.clone()))?;

        match key.as_str() {
            "priority" => settings.push(ScreenSetting::Priority(number("priority", &value)?)),
            "duration" => settings.push(ScreenSetting::Duration(number("duration", &value)?)),
            "name" => settings.push(ScreenSetting::Name(value)),
            ignored if IGNORED_SCREEN_KEYS.contains(&ignored) => {
                tracing::trace!(key = ignored, %value, "Ignoring screen setting");
            }
            _ => return Err(LcdError::UnknownScreenKey(key)),
        }
    }

    Ok(settings)
}

pub(super) fn number(name: &'static str, value: &str) -> Result<i32, LcdError> {
    value.parse().map_err(|_| LcdError::InvalidArgument {
        name,
        value: value.to_string(),
    })
}
