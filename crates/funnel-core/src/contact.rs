//! Contacts pushed to the external CRM.
//!
//! The CRM is an upsert-by-email API. A [`ContactUpsert`] is built either
//! from a stored sign-up or from a proxied request, and [`ContactUpsert::payload`]
//! renders the JSON body the CRM expects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
  Error, Result,
  registration::Registration,
  waitlist::WaitlistEntry,
  wire,
};

/// Which list a contact is joining. Selects the default tags and source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
  Registrant,
  Waitlist,
}

/// Custom CRM fields, in the order the CRM shows them.
pub const FIELD_NAMES: &[&str] = &[
  "utm_source",
  "utm_medium",
  "utm_campaign",
  "utm_content",
  "country",
  "city",
  "referrer",
  "registration_date",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUpsert {
  pub kind:       ContactKind,
  pub email:      String,
  pub first_name: String,
  pub last_name:  String,
  pub phone:      String,
  /// Empty means "use the configured tags for `kind`".
  pub tag_ids:    Vec<i64>,
  /// `None` means "use the configured source".
  pub source:     Option<String>,
  pub fields:     BTreeMap<String, String>,
}

impl ContactUpsert {
  pub fn from_registration(r: &Registration) -> Self {
    let d = &r.details;
    let c = &d.context;
    let mut fields = BTreeMap::new();
    for (name, value) in [
      ("utm_source", &c.utm_source),
      ("utm_medium", &c.utm_medium),
      ("utm_campaign", &c.utm_campaign),
      ("utm_content", &c.utm_content),
      ("country", &c.country),
      ("city", &c.city),
      ("referrer", &c.referrer),
    ] {
      if let Some(value) = value {
        fields.insert(name.to_owned(), value.clone());
      }
    }
    fields.insert("registration_date".to_owned(), wire::format_timestamp(r.timestamp));

    Self {
      kind: ContactKind::Registrant,
      email: r.email.clone(),
      first_name: d.first_name.clone().unwrap_or_default(),
      last_name: d.last_name.clone().unwrap_or_default(),
      phone: d.phone.clone().unwrap_or_default(),
      tag_ids: Vec::new(),
      source: None,
      fields,
    }
  }

  pub fn from_waitlist(w: &WaitlistEntry) -> Self {
    let d = &w.details;
    let mut fields = BTreeMap::new();
    if let Some(hear_about) = &d.hear_about {
      fields.insert("hear_about".to_owned(), hear_about.clone());
    }
    Self {
      kind: ContactKind::Waitlist,
      email: w.email.clone(),
      first_name: d.first_name.clone().unwrap_or_default(),
      last_name: d.last_name.clone().unwrap_or_default(),
      phone: d.phone.clone().unwrap_or_default(),
      tag_ids: Vec::new(),
      source: None,
      fields,
    }
  }

  /// Fills in the tags and source when the contact does not carry its own.
  pub fn with_defaults(mut self, tag_ids: &[i64], source: &str) -> Self {
    if self.tag_ids.is_empty() {
      self.tag_ids = tag_ids.to_vec();
    }
    if self.source.is_none() {
      self.source = Some(source.to_owned());
    }
    self
  }

  /// The CRM request body. Every known field is present, blank when unset.
  pub fn payload(&self) -> Value {
    let mut fields = serde_json::Map::new();
    fields.insert("source".to_owned(), json!(self.source.as_deref().unwrap_or_default()));
    for name in FIELD_NAMES {
      let value = self.fields.get(*name).map(String::as_str).unwrap_or_default();
      fields.insert((*name).to_owned(), json!(value));
    }
    for (name, value) in &self.fields {
      fields.entry(name.clone()).or_insert_with(|| json!(value));
    }

    json!({
      "contact": {
        "email_address": self.email,
        "first_name": self.first_name,
        "last_name": self.last_name,
        "phone_number": self.phone,
        "tag_ids": self.tag_ids,
        "fields": fields,
      }
    })
  }
}

/// Body of the public CRM proxy endpoint. Both camelCase and snake_case
/// spellings are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
  pub email:             Option<String>,
  #[serde(alias = "first_name")]
  pub first_name:        Option<String>,
  #[serde(alias = "last_name")]
  pub last_name:         Option<String>,
  pub phone:             Option<String>,
  #[serde(alias = "tag_ids", default)]
  pub tag_ids:           Vec<i64>,
  pub source:            Option<String>,
  #[serde(alias = "utm_source")]
  pub utm_source:        Option<String>,
  #[serde(alias = "utm_medium")]
  pub utm_medium:        Option<String>,
  #[serde(alias = "utm_campaign")]
  pub utm_campaign:      Option<String>,
  #[serde(alias = "utm_content")]
  pub utm_content:       Option<String>,
  pub country:           Option<String>,
  pub city:              Option<String>,
  pub referrer:          Option<String>,
  #[serde(alias = "registration_date")]
  pub registration_date: Option<String>,
  #[serde(alias = "hear_about")]
  pub hear_about:        Option<String>,
}

impl ContactRequest {
  pub fn into_upsert(self, kind: ContactKind) -> Result<ContactUpsert> {
    let email = wire::non_blank(self.email.as_deref())
      .ok_or(Error::MissingField("email"))?
      .to_owned();

    let fields = [
      ("utm_source", self.utm_source),
      ("utm_medium", self.utm_medium),
      ("utm_campaign", self.utm_campaign),
      ("utm_content", self.utm_content),
      ("country", self.country),
      ("city", self.city),
      ("referrer", self.referrer),
      ("registration_date", self.registration_date),
      ("hear_about", self.hear_about),
    ]
    .into_iter()
    .filter_map(|(name, value)| Some((name.to_owned(), value?)))
    .collect();

    Ok(ContactUpsert {
      kind,
      email,
      first_name: self.first_name.unwrap_or_default(),
      last_name: self.last_name.unwrap_or_default(),
      phone: self.phone.unwrap_or_default(),
      tag_ids: self.tag_ids,
      source: self.source,
      fields,
    })
  }
}
