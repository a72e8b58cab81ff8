// 🏷️ Category Entity - classification tags attached to trackers
//
// Five independent families share one shape. A tracker links to any number
// of categories in each family.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// CATEGORY FAMILY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryFamily {
    Capability,
    Advertising,
    Analytic,
    Network,
    TrackerCategory,
}

impl CategoryFamily {
    pub const ALL: [CategoryFamily; 5] = [
        CategoryFamily::Capability,
        CategoryFamily::Advertising,
        CategoryFamily::Analytic,
        CategoryFamily::Network,
        CategoryFamily::TrackerCategory,
    ];

    /// Stored discriminator
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryFamily::Capability => "capability",
            CategoryFamily::Advertising => "advertising",
            CategoryFamily::Analytic => "analytic",
            CategoryFamily::Network => "network",
            CategoryFamily::TrackerCategory => "tracker_category",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CategoryFamily::Capability => "Capability",
            CategoryFamily::Advertising => "Advertising",
            CategoryFamily::Analytic => "Analytic",
            CategoryFamily::Network => "Network",
            CategoryFamily::TrackerCategory => "Tracker",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        CategoryFamily::ALL
            .into_iter()
            .find(|family| family.as_str() == value)
    }

    /// Names seeded by `import_categories`
    pub fn default_names(&self) -> &'static [&'static str] {
        match self {
            CategoryFamily::Capability => &[
                "Tracks users using bluetooth",
                "Tracks users using ultrasonic",
                "Tracks users using location data",
                "Tracks users using GPS",
                "Tracks users using WiFi",
                "Tracks users using NFC",
                "Targets user location and proximity via geofencing",
                "Targets users via geotargeting",
            ],
            CategoryFamily::Advertising => &[
                "Loads advertisements",
                "Loads targeted advertisements",
                "Real-world location targeting",
                "Targeted advertising based on consumer actions",
                "Timed advertisements",
                "Targets across devices, channels and/or platforms (omni-channel marketing, customer journey)",
                "Bidding services",
                "Location-based ad pushing",
                "Alters app functionality based upon user profiles",
            ],
            CategoryFamily::Analytic => &[
                "Offers analytics activity to app developers",
                "Offers reports to app developers",
                "Collects Personally Identifiable Information (PII)",
                "Collects Sensitive Personal Information (SPI)",
                "Profiles users via Personally Identifiable Information (PII)",
                "Profiles users via Sensitive Personal Information (SPI)",
                "Performs cross-device identification",
                "Identifies users via Google ID (AAID)",
                "Identifies users via iOS ID (IDFA)",
                "Identifies users via network ID (hostname/ISP/SSID)",
                "Stores facial recognition data",
                "Stores personal profile data (name, address, phone)",
                "Analytics AI and machine learning",
                "Audience segmenting",
            ],
            CategoryFamily::Network => &[
                "Transmits user data to multiple ad networks",
                "Transmits information to Facebook ad network",
                "Transmits information to Google ad network",
                "Transmits information to Adobe ad network",
                "Transmits information to Yahoo! ad network",
                "Transmits information to Salesforce platform",
                "Transmits information to Twitter platform",
                "Transmits information to Amazon ad network",
                "Transmits information to Microsoft ad network",
            ],
            CategoryFamily::TrackerCategory => &[
                "Advertisement",
                "Analytics",
                "Crash reporting",
                "Identification",
                "Location",
                "Profiling",
            ],
        }
    }
}

// ============================================================================
// CATEGORY ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    #[serde(skip)]
    pub family: Option<CategoryFamily>,
    pub name: String,
    pub description: String,
    /// Also recognised by the Exodus reference source
    pub is_in_exodus: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Category {
    pub fn new(family: CategoryFamily, name: &str) -> Self {
        let now = Utc::now();

        Category {
            id: uuid::Uuid::new_v4().to_string(),
            family: Some(family),
            name: name.to_string(),
            description: String::new(),
            is_in_exodus: false,
            created: now,
            updated: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_round_trips_through_discriminator() {
        for family in CategoryFamily::ALL {
            assert_eq!(CategoryFamily::parse(family.as_str()), Some(family));
        }
        assert_eq!(CategoryFamily::parse("unknown"), None);
    }

    #[test]
    fn test_default_name_counts() {
        assert_eq!(CategoryFamily::Capability.default_names().len(), 8);
        assert_eq!(CategoryFamily::Advertising.default_names().len(), 9);
        assert_eq!(CategoryFamily::Analytic.default_names().len(), 14);
        assert_eq!(CategoryFamily::Network.default_names().len(), 9);
        assert_eq!(CategoryFamily::TrackerCategory.default_names().len(), 6);
    }

    #[test]
    fn test_new_category_defaults() {
        let category = Category::new(CategoryFamily::Advertising, "fake ad type name");
        assert_eq!(category.family, Some(CategoryFamily::Advertising));
        assert!(!category.is_in_exodus);
        assert!(category.description.is_empty());
        assert_eq!(category.id.len(), 36);
    }
}
