//! Class label tables
//!
//! Each classifier emits a probability vector whose index order is fixed at
//! training time. These tables map that index back to something a farmer can
//! read. The order is alphabetical (numeric for age) and must stay that way:
//! reordering an entry silently mislabels every prediction.

/// Number of disease classes
pub const NUM_DISEASES: usize = 10;

/// Number of paddy varieties
pub const NUM_VARIETIES: usize = 10;

/// Number of age buckets
pub const NUM_AGE_BUCKETS: usize = 18;

/// Disease classes, sorted
pub const DISEASE_LABELS: [&str; NUM_DISEASES] = [
    "Bacterial Leaf Blight",
    "Bacterial Leaf Streak",
    "Bacterial Panicle Blight",
    "Blast",
    "Brown Spot",
    "Dead Heart",
    "Downy Mildew",
    "Hispa",
    "Normal",
    "Tungro",
];

/// Paddy varieties, sorted
pub const VARIETY_LABELS: [&str; NUM_VARIETIES] = [
    "ADT45",
    "AndraPonni",
    "AtchayaPonni",
    "IR20",
    "KarnatakaPonni",
    "Onthanel",
    "Ponni",
    "RR",
    "Surya",
    "Zonal",
];

/// Plant age buckets in days after sowing, ascending
pub const AGE_DAYS: [u32; NUM_AGE_BUCKETS] = [
    45, 47, 50, 55, 57, 60, 62, 65, 66, 67, 68, 70, 72, 73, 75, 77, 80, 82,
];

/// Get the disease name for a given class index
pub fn disease_name(index: usize) -> Option<&'static str> {
    DISEASE_LABELS.get(index).copied()
}

/// Get the variety name for a given class index
pub fn variety_name(index: usize) -> Option<&'static str> {
    VARIETY_LABELS.get(index).copied()
}

/// Get the age in days for a given class index
pub fn age_days(index: usize) -> Option<u32> {
    AGE_DAYS.get(index).copied()
}

/// Check whether a disease label means the plant is healthy
pub fn is_healthy(label: &str) -> bool {
    label == "Normal"
}
