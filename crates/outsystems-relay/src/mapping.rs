/// Static mapping from OutSystems output fields to lookup document locations.
///
/// Built once at startup and shared read-only. Iteration order is insertion
/// order, which matters: the normalized key scan takes the first match.
use indexmap::IndexMap;

use crate::model::FieldSource;

/// Output fields expected by the OutSystems integration, in response order.
pub const OUTPUT_FIELDS: [&str; 36] = [
    "PROCESS_GROUP",
    "DIVISION",
    "QUALITY_REQUIREMENT_CAT",
    "CHIP_DELIVERY",
    "WAFER_DIAMETER",
    "BEOL_STACK_THICKNESS",
    "ORGANIC_PASIVATION",
    "BACK_SIDE_METAL_STACK_WITH_THICKNESS",
    "FINAL_THICKNESS_INCL_SUBSTRATE",
    "FINAL_THICKNESS_INCL_SUBSTRATE_AND_IMIDE",
    "RASTER_X",
    "RASTER_Y",
    "AREA",
    "RATIO",
    "BASICTYPE_NAME",
    "REFRENCE_1",
    "REFRENCE_2",
    "NEW_BASICTYPE",
    "ASSESSSMENT",
    "DATA_SOURCE_DRS_API",
    "FRONTEND",
    "FE_FAB",
    "BASE_MATERIAL",
    "LAYOUT/DIE",
    "IMIDE_OPENING",
    "SCRIBELINE_WIDTH_AX_AY",
    "ELESS_IN_SCRIBELINE",
    "PCM_IN_SCRIBELINE",
    "BALLS_BUMPS_PILLARS_WITH_HEIGHT",
    "DAF",
    "QUALITY",
    "VOLUME_EXPERIENCE",
    "PREASSEMBLY_YEILD",
    "FOCUS_TEAM_DUE_TO_PREASSEMBLY",
    "TECHNICAL_PROCESS_CHAIN",
    "PROCESS_BLOCK_COLOUR",
];

// (key, category, parameter). Spellings mirror the upstream schema and the
// OutSystems field names, typos included.
const BUILTIN: [(&str, &str, &str); 29] = [
    ("Basic_type", "Product", "Basic Type"),
    ("Process_Group", "Product", "Product Line"),
    ("Division", "Product", "Division"),
    ("Quality_requirement_cat", "Product", "Q-Status"),
    ("Chip_delivery", "Product", "Chip Delivery"),
    ("FE_FAB", "FrontEnd", "Substrate"),
    ("Wafer_Diameter", "Preassembly general", "Wafer diameter"),
    ("Base_material", "FrontEnd", "Substrate"),
    ("BEOL_STACK_thickness", "Front Side Stack", "FrontSideMetal Stack w/o EPA"),
    ("Organic_Pasivation", "Front Side Stack", "Organic Passivation Material"),
    ("Last_metal_with_thickness", "Front Side Stack", "FrontSideMetal Stack w/o EPA"),
    ("Back_side_Metal_stack_with_thickness", "Back Side Stack", "BackSideMetal Stack w/o Thickness"),
    ("Final_thickness_incl_substrate", "Thinning", "Si thickness incl. BSM/µm"),
    ("Final_thickness_incl_substrate_and_imide", "Thinning", "Thickness incl. Imid and BSM /µm"),
    ("Final_thickness_incl_sub_bomel", "Thinning", "TAIKO Ring height/µm"),
    ("Raster_x", "Preassembly general", "Raster x/mm"),
    ("Raster_y", "Preassembly general", "Raster y/mm"),
    ("Area", "Preassembly general", "Area/mm^2"),
    ("Ratio", "Preassembly general", "Ratio"),
    ("imide_opening", "Front Side Stack", "Passivation stack w/ EPA"),
    ("Scribeline_width_AX_AY", "Preassembly general", "Street saw width"),
    ("Eless_in_Scribeline", "Back Side Stack", "EPA"),
    ("PCM_in_scribeline", "Other", "Route max"),
    ("Balls_Bumps_Pillars_with_height", "BackEnd", "Package"),
    ("DAF", "BackEnd", "Segment"),
    ("Volume_Experience", "Product", "Product Family"),
    ("Preassembly_Yeild", "Product", "Product and Process Conformity"),
    ("Focus_Team_Due_to_Preassembly", "Preassembly general", "Preassembly site"),
    ("Process_block_colour", "Other", "mounting_orientation"),
];

#[derive(Debug, Clone, Default)]
pub struct FieldMappingTable {
    entries: IndexMap<String, FieldSource>,
}

impl FieldMappingTable {
    pub fn builtin() -> Self {
        BUILTIN
            .iter()
            .map(|&(key, category, parameter)| (key.to_string(), FieldSource::new(category, parameter)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSource)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Find the table entry for an output field.
    ///
    /// A direct key hit wins. Otherwise the first key (in table order) that
    /// equals the field once underscores are dropped and case is folded.
    pub fn resolve_key(&self, field: &str) -> Option<(&str, &FieldSource)> {
        if let Some((key, source)) = self.entries.get_key_value(field) {
            return Some((key.as_str(), source));
        }
        let wanted = normalize_key(field);
        self.iter().find(|(key, _)| normalize_key(key) == wanted)
    }
}

impl FromIterator<(String, FieldSource)> for FieldMappingTable {
    fn from_iter<I: IntoIterator<Item = (String, FieldSource)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn normalize_key(key: &str) -> String {
    key.replace('_', "").to_lowercase()
}
