use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Style {
    pub color: &'static str,
}

/// Constant category -> style lookup with a single default.
///
/// Lookup is exact (case and value); anything not in the table, including a
/// missing attribute, resolves to the default.
#[derive(Debug)]
pub struct ColorEncodingTable {
    name: &'static str,
    entries: &'static [(&'static str, &'static str)],
    default: &'static str,
}

impl ColorEncodingTable {
    pub const fn new(
        name: &'static str,
        entries: &'static [(&'static str, &'static str)],
        default: &'static str,
    ) -> Self {
        Self {
            name,
            entries,
            default,
        }
    }

    pub fn resolve(&self, category: Option<&str>) -> Style {
        let color = category
            .and_then(|c| self.entries.iter().find(|(key, _)| *key == c))
            .map(|(_, color)| *color)
            .unwrap_or(self.default);
        Style { color }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn entries(&self) -> impl Iterator<Item = (&'static str, Style)> + '_ {
        self.entries
            .iter()
            .map(|(category, color)| (*category, Style { color: *color }))
    }

    pub fn default_style(&self) -> Style {
        Style {
            color: self.default,
        }
    }
}

// Accommodation class of a point of interest ("clase").
pub static ACCOMMODATION_CLASS: ColorEncodingTable = ColorEncodingTable::new(
    "accommodation_class",
    &[
        ("AGROTURISMO aloj. Camping", "red"),
        ("AGROTURISMO s/alojamiento", "orange"),
        ("Albergue Turístico u Hostel", "blue"),
        ("Alojamiento en Estancia Turística", "green"),
        ("Apart-hotel", "purple"),
        ("Bed & Breakfast", "pink"),
        ("Bodega", "brown"),
        ("Cabañas", "cyan"),
        ("Dormis", "magenta"),
        ("Dormis / Cabaña", "lightblue"),
        ("ESTANCIA TURISTICA s/aloj.", "darkgreen"),
        ("Hostería", "darkblue"),
        ("Hotel", "black"),
        ("Motel", "darkred"),
        ("None", "gray"),
        ("Residencial", "yellow"),
        ("Turismo Rural", "lightgreen"),
        ("Turismo Rural / Vivienda tcas", "lightcoral"),
        ("Vivienda Turística", "lime"),
        ("Vivienda Turística / Cabaña", "slateblue"),
    ],
    "gray",
);

// Tourism region of a polygon ("region").
pub static REGION: ColorEncodingTable = ColorEncodingTable::new(
    "region",
    &[
        ("Alto Neuquén", "darkorange"),
        ("Pehuén", "forestgreen"),
        ("Lagos", "steelblue"),
        ("Confluencia", "firebrick"),
        ("Limay", "goldenrod"),
    ],
    "gray",
);

// Municipal category tier of a boundary ("categoria").
pub static CATEGORY_TIER: ColorEncodingTable = ColorEncodingTable::new(
    "category_tier",
    &[
        ("Primera", "navy"),
        ("Segunda", "teal"),
        ("Tercera", "olive"),
        ("Comisión de Fomento", "sienna"),
    ],
    "gray",
);

/// Names a table from configuration. The tables themselves are not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingTableId {
    AccommodationClass,
    Region,
    CategoryTier,
}

impl EncodingTableId {
    pub const ALL: [EncodingTableId; 3] = [
        EncodingTableId::AccommodationClass,
        EncodingTableId::Region,
        EncodingTableId::CategoryTier,
    ];

    pub fn table(self) -> &'static ColorEncodingTable {
        match self {
            EncodingTableId::AccommodationClass => &ACCOMMODATION_CLASS,
            EncodingTableId::Region => &REGION,
            EncodingTableId::CategoryTier => &CATEGORY_TIER,
        }
    }
}
