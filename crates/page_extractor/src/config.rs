use serde::{Deserialize, Serialize};

use crate::charset::DEFAULT_CHARSET;
use crate::dedup::DedupSettings;
use crate::fetch::FetchSettings;
use crate::hash::HashAlgorithm;
use crate::images::ImageFilter;
use crate::ConfigError;

/// Everything a parser needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Name of the digest and image-id hash; empty disables both.
    pub hash_algorithm: String,
    /// Digest identical content on different authorities to the same value.
    pub cross_authority_duplicates: bool,
    pub default_charset: String,
    /// Bytes of the body inspected for a byte-order mark or meta charset.
    pub sniff_limit: usize,
    /// Guess the encoding of documents with no usable label instead of using the default.
    pub detect_unlabeled: bool,
    pub image: ImageFilter,
    pub image_fetch: FetchSettings,
    pub dedup: DedupSettings,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: "MD5".to_string(),
            cross_authority_duplicates: false,
            default_charset: DEFAULT_CHARSET.to_string(),
            sniff_limit: 4 * 1024,
            detect_unlabeled: false,
            image: ImageFilter::default(),
            image_fetch: FetchSettings::default(),
            dedup: DedupSettings::default(),
        }
    }
}

impl ExtractorConfig {
    /// Loads and validates a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn hash_algorithm(&self) -> Result<Option<HashAlgorithm>, ConfigError> {
        HashAlgorithm::from_name(&self.hash_algorithm)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hash_algorithm()?;
        if encoding_rs::Encoding::for_label(self.default_charset.trim().as_bytes()).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown default charset {:?}",
                self.default_charset
            )));
        }
        if self.sniff_limit == 0 {
            return Err(ConfigError::Invalid("sniff_limit must be positive".into()));
        }
        if self.dedup.expected_items == 0 {
            return Err(ConfigError::Invalid(
                "dedup.expected_items must be positive".into(),
            ));
        }
        let rate = self.dedup.false_positive_rate;
        if !(rate > 0.0 && rate < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "dedup.false_positive_rate must be in (0, 1), got {rate}"
            )));
        }
        Ok(())
    }
}
