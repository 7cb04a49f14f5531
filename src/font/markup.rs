//! Inline `$...$` directives embedded in message text.
//!
//! A directive is a single code character followed by optional arguments,
//! enclosed in dollar signs: `$d2.5$`, `$C00ff00$`, `$i$`. Everything outside
//! directives is visible text.

use rgb::RGB8;

use crate::raster::RasterFlags;

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Invert,
    Underline,
    Flash,
    Idle,
    Rainbow,
    Transparent,
    Scroll,
    Duration { seconds: f64 },
    Priority(i32),
    /// `None` when the argument is not a valid colour; the current colour stays.
    Foreground(Option<RGB8>),
    Background(Option<RGB8>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Span {
    Glyph(char),
    Directive(Directive),
    /// An unrecognised directive code. Nothing after it is processed.
    Unknown(char),
}

/// Split `text` into glyphs and directives.
///
/// An unterminated `$` ends the sequence, as does an unknown directive (which
/// is kept as the final [`Span::Unknown`]).
pub fn parse(text: &str) -> Vec<Span> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans = Vec::with_capacity(chars.len());
    let mut n = 0;

    while n < chars.len() {
        let c = chars[n];

        if c != '$' {
            spans.push(Span::Glyph(c));
            n += 1;
            continue;
        }

        let Some(len) = chars[n + 1..].iter().position(|&c| c == '$') else {
            break;
        };
        let body = &chars[n + 1..n + 1 + len];
        n += len + 2;

        match parse_directive(body) {
            Ok(directive) => spans.push(Span::Directive(directive)),
            Err(code) => {
                spans.push(Span::Unknown(code));
                break;
            }
        }
    }

    spans
}

fn parse_directive(body: &[char]) -> Result<Directive, char> {
    let Some((&code, args)) = body.split_first() else {
        return Err('$');
    };
    let args: String = args.iter().collect();

    let directive = match code {
        'i' => Directive::Invert,
        'u' => Directive::Underline,
        'f' => Directive::Flash,
        'I' => Directive::Idle,
        'r' => Directive::Rainbow,
        'T' => Directive::Transparent,
        's' => Directive::Scroll,
        'd' => Directive::Duration {
            seconds: leading_number(&args),
        },
        'p' => Directive::Priority(leading_number::<f64>(&args) as i32),
        'C' => Directive::Foreground(leading_color(&args)),
        'B' => Directive::Background(leading_color(&args)),
        other => return Err(other),
    };

    Ok(directive)
}

fn leading_color(args: &str) -> Option<RGB8> {
    let hex: String = args.chars().take(6).collect();
    match crate::color::parse_hex_rgb(&hex) {
        Ok(color) => Some(color),
        Err(error) => {
            tracing::debug!(%error, "Ignoring colour directive");
            None
        }
    }
}

/// Parse the numeric prefix of `s`, yielding zero if there is none.
fn leading_number<T>(s: &str) -> T
where
    T: std::str::FromStr + Default,
{
    let s = s.trim_start();
    let mut end = 0;
    let mut seen_dot = false;

    for (idx, c) in s.char_indices() {
        let accept = match c {
            '+' | '-' => idx == 0,
            '.' if !seen_dot => {
                seen_dot = true;
                true
            }
            c => c.is_ascii_digit(),
        };

        if !accept {
            break;
        }
        end = idx + c.len_utf8();
    }

    s[..end].parse().unwrap_or_default()
}

impl RasterFlags {
    pub fn apply(&mut self, directive: &Directive) {
        match directive {
            Directive::Flash => self.want_flash = true,
            Directive::Idle => self.is_idle = true,
            Directive::Transparent => self.transparent = !self.transparent,
            Directive::Scroll => self.scroll = !self.scroll,
            Directive::Duration { seconds } => self.duration_us = (seconds * 1_000_000.0) as i64,
            Directive::Priority(p) => self.priority = *p,
            Directive::Invert
            | Directive::Underline
            | Directive::Rainbow
            | Directive::Foreground(_)
            | Directive::Background(_) => {}
        }
    }

    /// The flags a raster of these spans ends up with.
    pub fn from_spans(spans: &[Span]) -> Self {
        let mut flags = Self::default();
        for span in spans {
            match span {
                Span::Directive(d) => flags.apply(d),
                Span::Glyph(_) => {}
                Span::Unknown(_) => break,
            }
        }
        flags
    }
}

/// The characters that end up as glyphs.
pub fn visible_text(spans: &[Span]) -> String {
    spans
        .iter()
        .map_while(|span| match span {
            Span::Glyph(c) => Some(Some(*c)),
            Span::Directive(_) => Some(None),
            Span::Unknown(_) => None,
        })
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use rgb::RGB8;

    use super::*;

    #[test]
    fn plain_text_is_glyphs() {
        assert_eq!(
            parse("Hi"),
            vec![Span::Glyph('H'), Span::Glyph('i')]
        );
    }

    #[test]
    fn duration_directive() {
        let spans = parse("$d5$Hello");
        assert_eq!(
            spans[0],
            Span::Directive(Directive::Duration { seconds: 5.0 })
        );
        assert_eq!(visible_text(&spans), "Hello");
        assert_eq!(RasterFlags::from_spans(&spans).duration_us, 5_000_000);
    }

    #[test]
    fn fractional_duration_and_priority() {
        let flags = RasterFlags::from_spans(&parse("$d0.25$$p7$x"));
        assert_eq!(flags.duration_us, 250_000);
        assert_eq!(flags.priority, 7);
    }

    #[test]
    fn colours() {
        let spans = parse("$C00ff00$$Bzz$a");
        assert_eq!(
            spans,
            vec![
                Span::Directive(Directive::Foreground(Some(RGB8::new(0, 255, 0)))),
                Span::Directive(Directive::Background(None)),
                Span::Glyph('a'),
            ]
        );
    }

    #[test]
    fn toggles() {
        let flags = RasterFlags::from_spans(&parse("$T$$T$$T$$s$$f$$I$"));
        assert!(flags.transparent);
        assert!(!flags.scroll);
        assert!(flags.want_flash);
        assert!(flags.is_idle);
    }

    #[test]
    fn unknown_directive_stops_processing() {
        let spans = parse("ab$x$cd$p3$");
        assert_eq!(
            spans,
            vec![Span::Glyph('a'), Span::Glyph('b'), Span::Unknown('x')]
        );
        assert_eq!(visible_text(&spans), "ab");
        assert_eq!(RasterFlags::from_spans(&spans).priority, 0);
    }

    #[test]
    fn empty_directive_is_unknown() {
        assert_eq!(parse("a$$b"), vec![Span::Glyph('a'), Span::Unknown('$')]);
    }

    #[test]
    fn unterminated_dollar_ends_text() {
        assert_eq!(parse("a$p1b"), vec![Span::Glyph('a')]);
    }

    #[test]
    fn lenient_numbers() {
        assert_eq!(leading_number::<f64>("12abc"), 12.0);
        assert_eq!(leading_number::<f64>("-1.5.3"), -1.5);
        assert_eq!(leading_number::<f64>("abc"), 0.0);
        assert_eq!(leading_number::<f64>(""), 0.0);
    }

    #[test]
    fn unicode_glyphs() {
        assert_eq!(visible_text(&parse("$r$äöü€")), "äöü€");
    }
}
