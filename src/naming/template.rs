use chrono::NaiveDateTime;

use crate::channel::Channel;
use crate::foundation::core::FrameNumber;
use crate::foundation::error::{FramepassError, FramepassResult};
use crate::naming::timestamp::format_timestamp;

/// Pattern used when the caller supplies none and a single channel is selected.
pub const DEFAULT_PATTERN: &str = "(FileName)_(Camera)_frame_(Frame)";

/// Pattern used when the caller supplies none and several channels are selected.
pub const DEFAULT_MULTI_CHANNEL_PATTERN: &str = "(FileName)_(Camera)_frame_(Frame)_(Channel)";

/// Characters that are not allowed in a file name on at least one supported OS.
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// A recognized filename token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// `(FileName)`
    FileName,
    /// `(Camera)`
    Camera,
    /// `(ViewLayer)`
    ViewLayer,
    /// `(Frame)`
    Frame,
    /// `(Channel)`
    Channel,
    /// `(Start:<fmt>)`
    Start(String),
    /// `(End:<fmt>)`
    End(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Token(Token),
}

/// Values available to the template while naming one work item.
#[derive(Clone, Debug)]
pub struct RenderContext {
    /// Source document base name without extension.
    pub file_name: String,
    /// Active camera, if any.
    pub camera: Option<String>,
    /// Active view layer.
    pub view_layer: String,
    /// Frame of the item being named.
    pub frame: FrameNumber,
    /// Channel of the item being named.
    pub channel: Channel,
    /// Wall-clock time the run started.
    pub start_time: NaiveDateTime,
    /// Wall-clock time the item finished rendering.
    pub end_time: NaiveDateTime,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            file_name: "untitled".to_string(),
            camera: None,
            view_layer: String::new(),
            frame: FrameNumber(1),
            channel: Channel::Combined,
            start_time: NaiveDateTime::default(),
            end_time: NaiveDateTime::default(),
        }
    }
}

/// A parsed filename pattern.
///
/// Tokens are case-sensitive and parenthesis-delimited. Anything that is not a recognized token is
/// kept as literal text, so a typo like `(frame)` shows up verbatim in the file name instead of
/// being dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilenamePattern {
    source: String,
    segments: Vec<Segment>,
}

impl FilenamePattern {
    /// Parse and check the pattern's literal text for characters that are illegal in file names.
    pub fn new(source: impl Into<String>) -> FramepassResult<Self> {
        let pattern = Self::parse_lenient(source);
        pattern.check_literals()?;
        Ok(pattern)
    }

    /// Parse without validation. Never fails.
    pub fn parse_lenient(source: impl Into<String>) -> Self {
        let source = source.into();
        let segments = parse_segments(&source);
        Self { source, segments }
    }

    /// Original pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Return `true` when `token` occurs at least once.
    pub fn contains(&self, token: &Token) -> bool {
        self.tokens().any(|t| t == token)
    }

    /// Return `true` when the pattern has a `(Channel)` token.
    pub fn has_channel_token(&self) -> bool {
        self.contains(&Token::Channel)
    }

    /// Return `true` when the pattern has a `(Frame)` token.
    pub fn has_frame_token(&self) -> bool {
        self.contains(&Token::Frame)
    }

    /// Recognized tokens in order of appearance.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Token(t) => Some(t),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute every token. Literal text is copied unchanged.
    pub fn render(&self, ctx: &RenderContext) -> String {
        let mut out = String::with_capacity(self.source.len() + 32);
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(token) => out.push_str(&resolve(token, ctx)),
            }
        }
        out
    }

    /// Check the pattern against the number of channels it will name.
    ///
    /// With more than one channel the pattern must contain `(Channel)`, otherwise every channel of
    /// a frame would resolve to the same file.
    pub fn validate(&self, channel_count: usize) -> FramepassResult<()> {
        if self.source.trim().is_empty() {
            return Err(FramepassError::validation("filename pattern is empty"));
        }
        self.check_literals()?;
        if channel_count > 1 && !self.has_channel_token() {
            return Err(FramepassError::validation(format!(
                "filename pattern '{}' must contain (Channel) when rendering {channel_count} \
                 channels, otherwise the outputs overwrite each other",
                self.source
            )));
        }
        Ok(())
    }

    fn check_literals(&self) -> FramepassResult<()> {
        for seg in &self.segments {
            if let Segment::Literal(text) = seg
                && let Some(bad) = text.chars().find(|c| is_illegal(*c))
            {
                return Err(FramepassError::validation(format!(
                    "filename pattern '{}' contains illegal character {bad:?}",
                    self.source
                )));
            }
        }
        Ok(())
    }
}

impl Default for FilenamePattern {
    fn default() -> Self {
        Self::parse_lenient(DEFAULT_PATTERN)
    }
}

impl std::fmt::Display for FilenamePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Render `pattern` against `ctx`. Total: unknown or malformed tokens are left as literal text.
pub fn render(pattern: &str, ctx: &RenderContext) -> String {
    FilenamePattern::parse_lenient(pattern).render(ctx)
}

/// Validate `pattern` for a selection of `channel_count` channels.
pub fn validate(pattern: &str, channel_count: usize) -> FramepassResult<()> {
    FilenamePattern::parse_lenient(pattern).validate(channel_count)
}

/// Replace characters that cannot appear in a file name and trim trailing dots and spaces.
///
/// Token values (camera names, `:` in time formats) are not constrained by pattern validation, so
/// the resolved stem goes through this before it becomes a path.
pub fn sanitize_file_stem(stem: &str) -> String {
    let mut out: String = stem
        .chars()
        .map(|c| if is_illegal(c) { '_' } else { c })
        .collect();
    while out.ends_with('.') || out.ends_with(' ') {
        out.pop();
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

fn is_illegal(c: char) -> bool {
    ILLEGAL_CHARS.contains(&c) || c.is_control()
}

fn resolve(token: &Token, ctx: &RenderContext) -> String {
    match token {
        Token::FileName => ctx.file_name.clone(),
        Token::Camera => ctx.camera.clone().unwrap_or_default(),
        Token::ViewLayer => ctx.view_layer.clone(),
        Token::Frame => format!("{:04}", ctx.frame.0),
        Token::Channel => ctx.channel.name().to_string(),
        Token::Start(fmt) => format_timestamp(fmt, &ctx.start_time),
        Token::End(fmt) => format_timestamp(fmt, &ctx.end_time),
    }
}

fn parse_segments(source: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = source;

    while let Some(open) = rest.find('(') {
        literal.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let token = after
            .find(')')
            .and_then(|close| parse_token(&after[..close]).map(|t| (t, close)));
        match token {
            Some((token, close)) => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Token(token));
                rest = &after[close + 1..];
            }
            None => {
                literal.push('(');
                rest = after;
            }
        }
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

fn parse_token(inner: &str) -> Option<Token> {
    let token = match inner {
        "FileName" => Token::FileName,
        "Camera" => Token::Camera,
        "ViewLayer" => Token::ViewLayer,
        "Frame" => Token::Frame,
        "Channel" => Token::Channel,
        _ => {
            if let Some(fmt) = inner.strip_prefix("Start:") {
                Token::Start(fmt.to_string())
            } else if let Some(fmt) = inner.strip_prefix("End:") {
                Token::End(fmt.to_string())
            } else {
                return None;
            }
        }
    };
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ctx() -> RenderContext {
        RenderContext {
            file_name: "Shot".to_string(),
            camera: Some("CamA".to_string()),
            view_layer: "ViewLayer".to_string(),
            frame: FrameNumber(7),
            channel: Channel::Depth,
            start_time: NaiveDate::from_ymd_opt(2025, 10, 18)
                .unwrap()
                .and_hms_opt(17, 21, 18)
                .unwrap(),
            end_time: NaiveDate::from_ymd_opt(2025, 10, 18)
                .unwrap()
                .and_hms_opt(18, 2, 9)
                .unwrap(),
        }
    }

    #[test]
    fn file_name_and_frame() {
        let c = RenderContext {
            file_name: "Shot".to_string(),
            frame: FrameNumber(7),
            ..Default::default()
        };
        assert_eq!(render("(FileName)_(Frame)", &c), "Shot_0007");
    }

    #[test]
    fn frame_padding_does_not_truncate() {
        let c = RenderContext {
            frame: FrameNumber(123_456),
            ..Default::default()
        };
        assert_eq!(render("(Frame)", &c), "123456");
    }

    #[test]
    fn start_timestamp() {
        assert_eq!(render("(Start:yyyyMMdd)", &ctx()), "20251018");
        assert_eq!(render("(End:HH-mm-ss)", &ctx()), "18-02-09");
    }

    #[test]
    fn all_tokens_and_repeats() {
        let out = render(
            "(FileName)/(Camera)/(ViewLayer)/(Frame)/(Channel)/(Frame)",
            &ctx(),
        );
        assert_eq!(out, "Shot/CamA/ViewLayer/0007/Depth/0007");
    }

    #[test]
    fn missing_camera_is_empty() {
        let c = RenderContext {
            camera: None,
            ..ctx()
        };
        assert_eq!(render("[(Camera)]", &c), "[]");
    }

    #[test]
    fn channel_is_not_injected_without_token() {
        // Depth is not Combined, but without the token nothing is appended.
        assert_eq!(render("(FileName)_(Frame)", &ctx()), "Shot_0007");
    }

    #[test]
    fn unknown_and_malformed_tokens_stay_literal() {
        assert_eq!(render("(frame)_(Frame)", &ctx()), "(frame)_0007");
        assert_eq!(render("((Frame)", &ctx()), "(0007");
        assert_eq!(render("(Frame", &ctx()), "(Frame");
        assert_eq!(render("a)b(", &ctx()), "a)b(");
        assert_eq!(render("(Foo:bar)(Camera)", &ctx()), "(Foo:bar)CamA");
    }

    #[test]
    fn validate_requires_channel_token_for_multiple_channels() {
        assert!(validate("(FileName)_(Frame)", 3).is_err());
        assert!(validate("(FileName)_(Frame)", 1).is_ok());
        assert!(validate("(FileName)_(Frame)_(Channel)", 3).is_ok());
    }

    #[test]
    fn validate_rejects_illegal_literals_but_not_token_arguments() {
        assert!(validate("a:b_(Frame)", 1).is_err());
        assert!(validate("a/b", 1).is_err());
        assert!(validate("tab\there", 1).is_err());
        assert!(validate("(Start:HH:mm)_(Frame)", 1).is_ok());
        assert!(validate("   ", 1).is_err());
        assert!(FilenamePattern::new("x?y").is_err());
    }

    #[test]
    fn sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize_file_stem("a:b/c."), "a_b_c");
        assert_eq!(sanitize_file_stem(""), "_");
        assert_eq!(sanitize_file_stem("Shot_0007"), "Shot_0007");
    }

    #[test]
    fn tokens_are_reported_in_order() {
        let p = FilenamePattern::parse_lenient("(Frame)-x-(Start:yyyy)");
        let tokens: Vec<_> = p.tokens().cloned().collect();
        assert_eq!(tokens, vec![Token::Frame, Token::Start("yyyy".to_string())]);
        assert!(p.has_frame_token());
        assert!(!p.has_channel_token());
    }
}
