//! Fine taxonomic ranks grouped into coarse bands.
//!
//! Bands drive display-parent resolution, sibling ordering, badge glyphs and colors.

use std::fmt;

/// Fine rank → band name.
const RANK_BAND: &[(&str, &str)] = &[
    ("stateofmatter", "state"),
    ("domain", "kingdom"),
    ("superkingdom", "kingdom"),
    ("kingdom", "kingdom"),
    ("phylum", "phylum"),
    ("subphylum", "phylum"),
    ("superclass", "class"),
    ("class", "class"),
    ("subclass", "class"),
    ("subterclass", "class"),
    ("infraclass", "class"),
    ("superorder", "order"),
    ("order", "order"),
    ("suborder", "order"),
    ("infraorder", "order"),
    ("parvorder", "order"),
    ("zoosection", "order"),
    ("zoosubsection", "order"),
    ("superfamily", "family"),
    ("epifamily", "family"),
    ("family", "family"),
    ("subfamily", "family"),
    ("supertribe", "tribe"),
    ("tribe", "tribe"),
    ("subtribe", "tribe"),
    ("genus", "genus"),
    ("genushybrid", "genus"),
    ("subgenus", "genus"),
    ("section", "genus"),
    ("subsection", "genus"),
    ("complex", "species"),
    ("species", "species"),
    ("hybrid", "species"),
    ("infrahybrid", "species"),
    ("subspecies", "species"),
    ("variety", "species"),
    ("form", "species"),
];

/// Neutral stroke used by the rendering engine for uncolored links.
pub const NEUTRAL_STROKE: &str = "#6b7280";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RankBand {
    State,
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Tribe,
    Genus,
    Species,
    /// A rank missing from the lookup table is its own band.
    Other(String),
}

impl RankBand {
    pub const CANONICAL: [RankBand; 9] = [
        RankBand::State,
        RankBand::Kingdom,
        RankBand::Phylum,
        RankBand::Class,
        RankBand::Order,
        RankBand::Family,
        RankBand::Tribe,
        RankBand::Genus,
        RankBand::Species,
    ];

    /// Classify a fine rank (case-insensitive). Band names classify as themselves.
    pub fn of(rank: &str) -> Self {
        let lower = rank.trim().to_ascii_lowercase();
        let band = RANK_BAND
            .iter()
            .find(|(fine, _)| *fine == lower)
            .map(|(_, band)| *band)
            .unwrap_or(lower.as_str());
        Self::from_band_name(band)
    }

    fn from_band_name(name: &str) -> Self {
        match name {
            "state" => RankBand::State,
            "kingdom" => RankBand::Kingdom,
            "phylum" => RankBand::Phylum,
            "class" => RankBand::Class,
            "order" => RankBand::Order,
            "family" => RankBand::Family,
            "tribe" => RankBand::Tribe,
            "genus" => RankBand::Genus,
            "species" => RankBand::Species,
            other => RankBand::Other(other.to_string()),
        }
    }

    /// Legacy outlines mark ranks with a single trailing letter.
    pub fn from_legacy_letter(letter: char) -> Option<Self> {
        match letter {
            'F' => Some(RankBand::Family),
            'G' => Some(RankBand::Genus),
            'S' => Some(RankBand::Species),
            'O' => Some(RankBand::Order),
            'C' => Some(RankBand::Class),
            'P' => Some(RankBand::Phylum),
            'K' | 'D' => Some(RankBand::Kingdom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RankBand::State => "state",
            RankBand::Kingdom => "kingdom",
            RankBand::Phylum => "phylum",
            RankBand::Class => "class",
            RankBand::Order => "order",
            RankBand::Family => "family",
            RankBand::Tribe => "tribe",
            RankBand::Genus => "genus",
            RankBand::Species => "species",
            RankBand::Other(name) => name,
        }
    }

    /// Position in the fixed band order. Unknown bands sort after every canonical band.
    pub fn sort_index(&self) -> usize {
        Self::CANONICAL
            .iter()
            .position(|band| band == self)
            .unwrap_or(usize::MAX)
    }

    pub fn color(&self) -> Option<&'static str> {
        match self {
            RankBand::State => Some("#64748b"),
            RankBand::Kingdom => Some("#a855f7"),
            RankBand::Phylum => Some("#ef4444"),
            RankBand::Class => Some("#f59e0b"),
            RankBand::Order => Some("#6366f1"),
            RankBand::Family => Some("#06b6d4"),
            RankBand::Tribe => Some("#0ea5e9"),
            RankBand::Genus => Some("#10b981"),
            RankBand::Species => Some("#22c55e"),
            RankBand::Other(_) => None,
        }
    }

    /// One-letter badge glyph. Unknown bands get none, so they never pose as a
    /// canonical band.
    pub fn glyph(&self) -> Option<char> {
        match self {
            RankBand::Other(_) => None,
            band => band.as_str().chars().next().map(|c| c.to_ascii_uppercase()),
        }
    }

    pub fn is_species(&self) -> bool {
        *self == RankBand::Species
    }

    pub fn is_genus(&self) -> bool {
        *self == RankBand::Genus
    }
}

impl fmt::Display for RankBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
