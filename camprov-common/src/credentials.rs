use serde::Deserialize;

/// Credentials applied during provisioning.
///
/// The administrator username is always `root`; any other value
/// supplied by the caller is overridden (and the override is logged by
/// the caller, not here — this type is pure data).
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub root_password: String,

    #[serde(default)]
    pub secondary_user: Option<String>,
    #[serde(default)]
    pub secondary_password: Option<String>,

    #[serde(default)]
    pub onvif_user: Option<String>,
    #[serde(default)]
    pub onvif_password: Option<String>,
}

impl Credentials {
    pub const ADMIN_USER: &'static str = "root";

    /// Secondary account steps activate only when both fields are present.
    pub fn secondary(&self) -> Option<(&str, &str)> {
        match (&self.secondary_user, &self.secondary_password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }

    /// ONVIF account steps activate only when both fields are present.
    pub fn onvif(&self) -> Option<(&str, &str)> {
        match (&self.onvif_user, &self.onvif_password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secondary_requires_both_fields() {
        let creds = Credentials {
            root_password: "x".into(),
            secondary_user: Some("svc".into()),
            secondary_password: None,
            onvif_user: None,
            onvif_password: None,
        };
        assert!(creds.secondary().is_none());
    }

    #[test]
    fn secondary_activates_when_both_present() {
        let creds = Credentials {
            root_password: "x".into(),
            secondary_user: Some("svc".into()),
            secondary_password: Some("pw".into()),
            onvif_user: None,
            onvif_password: None,
        };
        assert_eq!(creds.secondary(), Some(("svc", "pw")));
    }
}
