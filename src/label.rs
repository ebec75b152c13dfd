//! Label codec.
//!
//! Outline labels carry their attributes as inline text: `{rank:genus}` tokens, legacy
//! trailing band letters, `{color:red}…{/color}` participant wrappers, hyperlinks and
//! photo chips. [`Label::decode`] lifts those into typed fields; markup is produced again
//! only at the serialization boundary ([`decorate`], the SVG writer, the HTML export).

use std::sync::LazyLock;

use regex::Regex;

use crate::rank::RankBand;
use crate::xml::escape_xml;

static BULLET_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*(?:(?:[-*+]|\d+\.)\s+|#{1,6}\s+)?)(.*)$").expect("bullet regex")
});
static RANK_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\{rank:([a-z_-]*)\}\s*").expect("rank token regex"));
static RANK_BADGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\s*<span\s+class="mm-badge\s+mm-rank"([^>]*)>(.*?)</span>"#)
        .expect("badge regex")
});
static ANY_BADGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\s*<span\s+class="mm-badge[^"]*"[^>]*>.*?</span>"#).expect("badge regex")
});
static DATA_RANK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(?:data-rank|title)="([^"]*)""#).expect("attr regex"));
static LEGACY_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\s)([FGSOCPKD])\s*$").expect("legacy regex"));
static COLOR_WRAPPER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\{color:([^}]+)\}(.*?)\{/color\}").expect("color wrapper regex")
});
static COLOR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{/?color(?::[^}]*)?\}").expect("color token regex"));
static PARTICIPANT_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<span\s+class="([a-z0-9]+-node)"(?:\s+data-color="([^"]*)")?[^>]*>(.*?)</span>"#)
        .expect("participant span regex")
});
static PHOTO_CHIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<a\b[^>]*>\s*\x{1F5BC}\x{FE0F}?\s*</a>|\[\x{1F5BC}\x{FE0F}?\]\([^)]*\)")
        .expect("photo chip regex")
});
static PHOTO_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*href="([^"]*)"[^>]*>\s*\x{1F5BC}\x{FE0F}?\s*</a>|\[\x{1F5BC}\x{FE0F}?\]\(([^)]*)\)"#)
        .expect("photo href regex")
});
static HTML_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b[^>]*>(.*?)</a>").expect("link regex"));
static LINK_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*href="([^"]*)"[^>]*>|\[[^\]]*\]\(([^)]*)\)"#).expect("href regex")
});
static MD_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("markdown link regex"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^>]*>").expect("tag regex"));
static PHOTO_GLYPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x{1F5BC}\x{FE0F}?").expect("photo glyph regex"));
static PICTOGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{Extended_Pictographic}\x{FE0F}?").expect("pictograph regex"));
static GLYPH_REMNANT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s(?:[FGSOCPKD]|s[FGCODKP]|e[FG]|i[O])\s*$").expect("glyph remnant regex")
});
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Which set(s) a node belongs to in comparison and checklist trees.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Participant {
    FirstOnly,
    SecondOnly,
    Shared,
    Observed,
    NotObserved,
    Custom(String),
}

impl Participant {
    pub fn from_token(token: &str) -> Self {
        let token = token.trim();
        match token.to_ascii_lowercase().as_str() {
            "red" | "#dc2626" => Participant::FirstOnly,
            "blue" | "#2563eb" => Participant::SecondOnly,
            "purple" | "#9333ea" => Participant::Shared,
            "#22c55e" => Participant::Observed,
            "#9ca3af" => Participant::NotObserved,
            _ => Participant::Custom(token.to_string()),
        }
    }

    fn from_css_class(class: &str, color: Option<&str>) -> Option<Self> {
        match class {
            "user1-node" => Some(Participant::FirstOnly),
            "user2-node" => Some(Participant::SecondOnly),
            "shared-node" => Some(Participant::Shared),
            "seen-node" => Some(Participant::Observed),
            "unseen-node" => Some(Participant::NotObserved),
            "custom-node" => color.map(|c| Participant::Custom(c.to_string())),
            _ => None,
        }
    }

    /// Token written back into annotated outlines.
    pub fn token(&self) -> &str {
        match self {
            Participant::FirstOnly => "red",
            Participant::SecondOnly => "blue",
            Participant::Shared => "purple",
            Participant::Observed => "#22c55e",
            Participant::NotObserved => "#9ca3af",
            Participant::Custom(token) => token,
        }
    }

    pub fn color(&self) -> &str {
        match self {
            Participant::FirstOnly => "#dc2626",
            Participant::SecondOnly => "#2563eb",
            Participant::Shared => "#9333ea",
            Participant::Observed => "#22c55e",
            Participant::NotObserved => "#9ca3af",
            Participant::Custom(token) => token,
        }
    }

    pub fn node_class(&self) -> &'static str {
        match self {
            Participant::FirstOnly => "user1-node",
            Participant::SecondOnly => "user2-node",
            Participant::Shared => "shared-node",
            Participant::Observed => "seen-node",
            Participant::NotObserved => "unseen-node",
            Participant::Custom(_) => "custom-node",
        }
    }

    pub fn edge_classes(&self) -> &'static [&'static str] {
        match self {
            Participant::FirstOnly => &["user1-edge"],
            Participant::SecondOnly => &["user2-edge"],
            Participant::Shared => &["shared-edge"],
            Participant::Observed => &["seen-edge"],
            Participant::NotObserved => &["unseen-edge", "missing-edge"],
            Participant::Custom(_) => &[],
        }
    }
}

/// A label with its inline annotations lifted into fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Label {
    /// Remaining markup (links, photo chips) with rank and color annotations removed.
    pub body: String,
    /// Fine rank, or the band name for legacy letter suffixes.
    pub rank: Option<String>,
    pub band: Option<RankBand>,
    pub glyph: Option<char>,
    pub participant: Option<Participant>,
}

impl Label {
    pub fn decode(raw: &str) -> Self {
        let mut label = Label::default();
        let mut body = raw.to_string();

        if let Some(caps) = COLOR_WRAPPER.captures(&body) {
            label.participant = Some(Participant::from_token(&caps[1]));
            body = COLOR_WRAPPER.replace_all(&body, "$2").into_owned();
        } else if let Some(caps) = PARTICIPANT_SPAN.captures(&body) {
            label.participant =
                Participant::from_css_class(&caps[1], caps.get(2).map(|m| m.as_str()));
            if label.participant.is_some() {
                body = PARTICIPANT_SPAN.replace_all(&body, "$3").into_owned();
            }
        }
        body = COLOR_TOKEN.replace_all(&body, "").into_owned();

        if let Some(caps) = RANK_TOKEN.captures(&body) {
            let fine = caps[1].to_ascii_lowercase();
            body = RANK_TOKEN.replace_all(&body, " ").into_owned();
            label.set_rank(&fine, None);
        } else if let Some(caps) = RANK_BADGE.captures(&body) {
            let fine = DATA_RANK
                .captures(&caps[1])
                .map(|attr| attr[1].trim().to_ascii_lowercase())
                .unwrap_or_default();
            let glyph = HTML_TAG.replace_all(&caps[2], "").trim().chars().next();
            body = RANK_BADGE.replace_all(&body, "").into_owned();
            label.set_rank(&fine, glyph);
        } else if let Some(caps) = LEGACY_LETTER.captures(&body) {
            let letter = caps[2].chars().next();
            if let Some(band) = letter.and_then(RankBand::from_legacy_letter) {
                body = LEGACY_LETTER.replace(&body, "$1").into_owned();
                label.rank = Some(band.as_str().to_string());
                label.band = Some(band);
                label.glyph = letter;
            }
        }

        label.body = body.trim().to_string();
        label
    }

    fn set_rank(&mut self, fine: &str, glyph: Option<char>) {
        if fine.is_empty() {
            return;
        }
        let band = RankBand::of(fine);
        self.glyph = glyph.or_else(|| band.glyph());
        self.rank = Some(fine.to_string());
        self.band = Some(band);
    }

    /// Plain display text: markup stripped, whitespace collapsed.
    pub fn text(&self) -> String {
        let plain = to_plain_text(&self.body);
        WHITESPACE.replace_all(&plain, " ").trim().to_string()
    }

    /// First non-photo hyperlink target.
    pub fn href(&self) -> Option<String> {
        let stripped = PHOTO_CHIP.replace_all(&self.body, "");
        LINK_HREF
            .captures(&stripped)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str().to_string())
    }

    /// Target of the photo chip, if the label carries one.
    pub fn photo(&self) -> Option<String> {
        PHOTO_HREF
            .captures(&self.body)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str().to_string())
    }

    /// Back to the annotated outline form (`{color:*}` wrapper, `{rank:*}` token).
    pub fn to_annotated(&self) -> String {
        let mut out = match &self.participant {
            Some(p) => format!("{{color:{}}}{}{{/color}}", p.token(), self.body),
            None => self.body.clone(),
        };
        if let Some(rank) = &self.rank {
            out.push_str(&format!(" {{rank:{rank}}}"));
        }
        out
    }

    /// Markup consumed by the rendering engine: participant span plus rank badge. Text
    /// outside tags is escaped, so [`to_plain_text`] gives it back unchanged.
    pub fn to_decorated(&self) -> String {
        let body = escape_outside_tags(&self.body);
        let mut out = match &self.participant {
            Some(Participant::Custom(color)) => format!(
                r#"<span class="custom-node" data-color="{}">{body}</span>"#,
                escape_xml(color)
            ),
            Some(p) => format!(r#"<span class="{}">{body}</span>"#, p.node_class()),
            None => body,
        };
        if let (Some(rank), Some(band)) = (&self.rank, &self.band) {
            out.push(' ');
            out.push_str(&badge_html(rank, band, self.glyph));
        }
        out
    }
}

fn escape_outside_tags(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut last = 0;
    for tag in HTML_TAG.find_iter(body) {
        out.push_str(&escape_xml(&body[last..tag.start()]));
        out.push_str(tag.as_str());
        last = tag.end();
    }
    out.push_str(&escape_xml(&body[last..]));
    out
}

/// Inline rank badge. `title`/`data-rank` carry the fine rank for tooltips.
pub fn badge_html(rank: &str, band: &RankBand, glyph: Option<char>) -> String {
    let glyph = glyph.or_else(|| band.glyph()).map(String::from).unwrap_or_default();
    format!(
        r#"<span class="mm-badge mm-rank" title="{rank}" data-rank="{rank}" data-band="{band}">{glyph}</span>"#
    )
}

/// Replace rank annotations with badges and color wrappers with participant spans,
/// line by line, keeping indentation and bullet markers.
pub fn decorate(outline: &str) -> String {
    map_labels(outline, |raw| Label::decode(raw).to_decorated())
}

/// Re-annotate an outline in canonical token form (badges become `{rank:*}` tokens).
pub fn annotate(outline: &str) -> String {
    map_labels(outline, |raw| Label::decode(raw).to_annotated())
}

fn map_labels(outline: &str, mut f: impl FnMut(&str) -> String) -> String {
    outline
        .lines()
        .map(|line| match BULLET_LINE.captures(line) {
            Some(caps) if !caps[2].trim().is_empty() => format!("{}{}", &caps[1], f(&caps[2])),
            _ => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strip every decoration: badges, rank and color tokens, participant spans, links
/// (kept as inner text), photo chips and other tags. Entities are decoded and trailing
/// whitespace is trimmed per line.
pub fn to_plain_text(decorated: &str) -> String {
    let s = ANY_BADGE.replace_all(decorated, "");
    let s = RANK_TOKEN.replace_all(&s, " ");
    let s = COLOR_TOKEN.replace_all(&s, "");
    let s = PHOTO_CHIP.replace_all(&s, "");
    let s = HTML_LINK.replace_all(&s, "$1");
    let s = MD_LINK.replace_all(&s, "$1");
    let s = HTML_TAG.replace_all(&s, "");
    let s = PHOTO_GLYPH.replace_all(&s, "");
    let s = htmlize::unescape(s.into_owned());
    s.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Label for graph exports: plain text without trailing band-glyph remnants.
pub fn clean_graph_label(raw: &str) -> String {
    let plain = to_plain_text(raw);
    let plain = GLYPH_REMNANT.replace(&plain, "");
    WHITESPACE.replace_all(&plain, " ").trim().to_string()
}

/// Label for phylogenetic text: plain text with pictographs removed.
pub fn phylo_label(label: &Label) -> String {
    let text = label.text();
    let text = PICTOGRAPH.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
