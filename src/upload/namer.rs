use rand::Rng;

/// Upper bound (inclusive) of the random component of a stored name.
const RANDOM_SUFFIX_MAX: u32 = 1_000_000_000;

/// Stem used when nothing is left of the original one.
const FALLBACK_STEM: &str = "image";

/// Derives collision-resistant names for files entering the storage directory.
///
/// A stored name is `{stem}-{epoch millis}-{random}{ext}`. Uniqueness is
/// probabilistic: no registry is consulted, so concurrent uploads never
/// serialize on a shared lock. Leading dots are dropped from the stem so a
/// stored file is never hidden from the public mount.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageNamer;

impl StorageNamer {
    pub fn new() -> Self {
        Self
    }

    pub fn stored_name(&self, original_name: &str) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let random = rand::rng().random_range(0..=RANDOM_SUFFIX_MAX);
        self.stored_name_with(original_name, millis, random)
    }

    pub(crate) fn stored_name_with(&self, original_name: &str, millis: i64, random: u32) -> String {
        let (stem, extension) = split_extension(base_name(original_name));
        let stem = match stem.trim_start_matches('.') {
            "" => FALLBACK_STEM,
            visible => visible,
        };
        format!("{}-{}-{}{}", stem, millis, random, extension)
    }
}

/// Final path component of a client supplied name. Both separators are
/// stripped so a Windows style name cannot escape the storage directory.
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Splits a bare file name into stem and extension, the extension keeping its
/// leading dot. A name whose only dot is the first character has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(index) => name.split_at(index),
    }
}
