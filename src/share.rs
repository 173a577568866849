//! Store share links and their QR codes.

use reqwest::Url;

use crate::model::StaffSession;

pub const STORE_PARAM: &str = "empresa";
const QR_SIZE: &str = "400x400";

/// Link customers open to land on the request form with the store preset.
pub fn store_link(public: &Url, staff: &StaffSession) -> Url {
    let key = staff
        .empresa_alias
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or(staff.empresa_id.as_str());
    let mut url = public.clone();
    url.query_pairs_mut().clear().append_pair(STORE_PARAM, key);
    url
}

pub fn qr_image_url(service: &Url, link: &Url) -> Url {
    let mut url = service.clone();
    url.query_pairs_mut()
        .clear()
        .append_pair("size", QR_SIZE)
        .append_pair("data", link.as_str());
    url
}

/// Store id carried by a share link, if any.
pub fn store_from_link(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == STORE_PARAM)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
