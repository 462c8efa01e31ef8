//! Settings types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Administrative settings of an SCC instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Event Notifications integration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_notifications: Option<EventNotifications>,

    /// Cloud Object Storage integration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_storage: Option<ObjectStorage>,
}

/// Event Notifications settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventNotifications {
    /// CRN of the Event Notifications instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_crn: Option<String>,

    /// Last update time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<DateTime<Utc>>,

    /// CRN of the registered source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,

    /// Description shown for the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_description: Option<String>,

    /// Name shown for the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
}

/// Cloud Object Storage settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectStorage {
    /// CRN of the Cloud Object Storage instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_crn: Option<String>,

    /// Bucket receiving evaluation results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    /// Bucket region.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_location: Option<String>,

    /// Bucket endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_endpoint: Option<String>,

    /// Last update time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<DateTime<Utc>>,
}

/// Result of sending a test event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEvent {
    /// Whether the event was delivered.
    pub success: bool,
}
