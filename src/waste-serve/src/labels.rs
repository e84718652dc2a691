//! Static lookup tables keyed by subcategory label.

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

/// Coarse waste grouping derived from the predicted subcategory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MainCategory {
    Organic,
    Inorganic,
    Hazardous,
    Unknown,
}

const CATEGORY_MAPPING: &[(&str, MainCategory)] = &[
    ("Sisa_Buah_dan_Sayur", MainCategory::Organic),
    ("Sisa_Makanan", MainCategory::Organic),
    ("Alumunium", MainCategory::Inorganic),
    ("Kaca", MainCategory::Inorganic),
    ("Kardus", MainCategory::Inorganic),
    ("Karet", MainCategory::Inorganic),
    ("Kertas", MainCategory::Inorganic),
    ("Plastik", MainCategory::Inorganic),
    ("Styrofoam", MainCategory::Inorganic),
    ("Tekstil", MainCategory::Inorganic),
    ("Alat_Pembersih_Kimia", MainCategory::Hazardous),
    ("Baterai", MainCategory::Hazardous),
    ("Lampu_dan_Elektronik", MainCategory::Hazardous),
    ("Minyak_dan_Oli_Bekas", MainCategory::Hazardous),
    ("Obat_dan_Medis", MainCategory::Hazardous),
];

impl MainCategory {
    /// Look up the main category of a subcategory, `Unknown` when unmapped.
    pub fn for_subcategory(subcategory: &str) -> Self {
        CATEGORY_MAPPING
            .iter()
            .find(|(name, _)| *name == subcategory)
            .map(|(_, category)| *category)
            .unwrap_or(MainCategory::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MainCategory::Organic => "Organic",
            MainCategory::Inorganic => "Inorganic",
            MainCategory::Hazardous => "Hazardous",
            MainCategory::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for MainCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Localized name, broad type and disposal hint for one subcategory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayDetails {
    pub name_id: Cow<'static, str>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub disposal: &'static str,
}

pub const MANUAL_CHECK: &str = "Cek manual";

// slug, Indonesian name, type, disposal
const DISPLAY_DETAILS: &[(&str, &str, &str, &str)] = &[
    ("cardboard", "Karton/Kardus", "Recyclable", "Daur ulang"),
    ("glass", "Kaca", "Recyclable", "Daur ulang"),
    ("metal", "Logam/Kaleng", "Recyclable", "Daur ulang"),
    ("paper", "Kertas", "Recyclable", "Daur ulang"),
    ("plastic", "Plastik", "Recyclable", "Daur ulang"),
    ("trash", "Sampah Umum", "Inorganic", "Buang biasa"),
    ("battery", "Baterai", "Hazardous", "Limbah berbahaya"),
    ("biological", "Biologis", "Organic", "Kompos"),
    ("brown-glass", "Kaca Coklat", "Recyclable", "Daur ulang"),
    ("clothes", "Pakaian", "Reusable", "Donasi/daur ulang"),
    ("green-glass", "Kaca Hijau", "Recyclable", "Daur ulang"),
    ("shoes", "Sepatu", "Reusable", "Donasi/daur ulang"),
    ("white-glass", "Kaca Putih", "Recyclable", "Daur ulang"),
    ("organic", "Organik", "Organic", "Kompos"),
    ("other", "Lainnya", "Mixed", MANUAL_CHECK),
    ("Sisa_Buah_dan_Sayur", "Sisa Buah dan Sayur", "Organic", "Kompos"),
    ("Sisa_Makanan", "Sisa Makanan", "Organic", "Kompos"),
    ("Alumunium", "Aluminium", "Recyclable", "Daur ulang"),
    ("Kaca", "Kaca", "Recyclable", "Daur ulang"),
    ("Kardus", "Kardus", "Recyclable", "Daur ulang"),
    ("Karet", "Karet", "Inorganic", "Bank sampah"),
    ("Kertas", "Kertas", "Recyclable", "Daur ulang"),
    ("Plastik", "Plastik", "Recyclable", "Daur ulang"),
    ("Styrofoam", "Styrofoam", "Inorganic", "Buang biasa"),
    ("Tekstil", "Tekstil", "Reusable", "Donasi/daur ulang"),
    ("Alat_Pembersih_Kimia", "Alat Pembersih Kimia", "Hazardous", "Limbah berbahaya"),
    ("Baterai", "Baterai", "Hazardous", "Limbah berbahaya"),
    ("Lampu_dan_Elektronik", "Lampu dan Elektronik", "Hazardous", "Limbah berbahaya"),
    ("Minyak_dan_Oli_Bekas", "Minyak dan Oli Bekas", "Hazardous", "Limbah berbahaya"),
    ("Obat_dan_Medis", "Obat dan Medis", "Hazardous", "Limbah berbahaya"),
];

/// Display details for a subcategory slug.
///
/// Unknown slugs get their title-cased name, type `Unknown` and the
/// manual-check disposal hint.
pub fn display_details(slug: &str) -> DisplayDetails {
    match DISPLAY_DETAILS.iter().find(|(name, ..)| *name == slug) {
        Some(&(_, name_id, kind, disposal)) => DisplayDetails {
            name_id: Cow::Borrowed(name_id),
            kind,
            disposal,
        },
        None => DisplayDetails {
            name_id: Cow::Owned(title_case(slug)),
            kind: "Unknown",
            disposal: MANUAL_CHECK,
        },
    }
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;

    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }

    out
}
