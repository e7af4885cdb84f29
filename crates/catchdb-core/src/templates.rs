//! Named SQL templates with per-deployment overrides.

use std::collections::BTreeMap;
use std::fmt;

use catchdb_error::{CatchError, Result};
use catchdb_types::CatchKind;

use crate::config::Preferences;
use crate::sql;

/// One statement the data-access layer issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Template {
    /// Parameter code to name lookup; reversed for name to code.
    Parameters,
    ParameterList,
    /// Operation name to column prefix lookup.
    Operations,
    OperationList,
    /// Environment values for one (position, time lag, parameter) step.
    Environments,
    EnvironmentUpdate,
    EnvironmentInsert,
    /// Catches within a time range (and, for seines, an area).
    Catches(CatchKind),
    /// Catch identifiers ordered by ID, extended with requested catch columns.
    CatchIds(CatchKind),
    CatchUpdate(CatchKind),
}

impl Template {
    pub const ALL: [Self; 13] = [
        Self::Parameters,
        Self::ParameterList,
        Self::Operations,
        Self::OperationList,
        Self::Environments,
        Self::EnvironmentUpdate,
        Self::EnvironmentInsert,
        Self::Catches(CatchKind::Longline),
        Self::Catches(CatchKind::Seine),
        Self::CatchIds(CatchKind::Longline),
        Self::CatchIds(CatchKind::Seine),
        Self::CatchUpdate(CatchKind::Longline),
        Self::CatchUpdate(CatchKind::Seine),
    ];

    /// Preference key under which this template can be overridden.
    #[must_use]
    pub fn key(self) -> String {
        match self {
            Self::Parameters => "Parameters".to_owned(),
            Self::ParameterList => "Parameters:LIST".to_owned(),
            Self::Operations => "Operations".to_owned(),
            Self::OperationList => "Operations:LIST".to_owned(),
            Self::Environments => "Environments".to_owned(),
            Self::EnvironmentUpdate => "Environments:UPDATE".to_owned(),
            Self::EnvironmentInsert => "Environments:INSERT".to_owned(),
            Self::Catches(kind) => kind.table().to_owned(),
            Self::CatchIds(kind) => format!("{}:ID", kind.table()),
            Self::CatchUpdate(kind) => format!("{}:UPDATE", kind.table()),
        }
    }

    #[must_use]
    pub const fn default_sql(self) -> &'static str {
        match self {
            Self::Parameters => "SELECT ID, name FROM Parameters WHERE ID=?",
            Self::ParameterList => "SELECT name FROM Parameters ORDER BY ID",
            Self::Operations => "SELECT name, prefix FROM Operations WHERE name=?",
            Self::OperationList => "SELECT name FROM Operations",
            Self::Environments => {
                "SELECT ID FROM Environments WHERE position=? AND timeLag=? AND parameter=? ORDER BY ID"
            }
            Self::EnvironmentUpdate => {
                "UPDATE Environments SET [?]=? WHERE ID=? AND position=? AND timeLag=? AND parameter=?"
            }
            Self::EnvironmentInsert => {
                "INSERT INTO Environments (ID, position, timeLag, parameter, [?]) VALUES (?, ?, ?, ?, ?)"
            }
            Self::Catches(CatchKind::Longline) => {
                "SELECT ID, date, start_longitude, start_latitude, end_longitude, end_latitude FROM Longlines WHERE date >= ? AND date <= ? ORDER BY date"
            }
            Self::Catches(CatchKind::Seine) => {
                "SELECT ID, date, longitude, latitude FROM Seines WHERE date >= ? AND date <= ? AND longitude >= ? AND longitude <= ? AND latitude >= ? AND latitude <= ? ORDER BY date"
            }
            Self::CatchIds(CatchKind::Longline) => "SELECT ID FROM Longlines ORDER BY ID",
            Self::CatchIds(CatchKind::Seine) => "SELECT ID FROM Seines ORDER BY ID",
            Self::CatchUpdate(CatchKind::Longline) => "UPDATE Longlines SET [?]=? WHERE ID=?",
            Self::CatchUpdate(CatchKind::Seine) => "UPDATE Seines SET [?]=? WHERE ID=?",
        }
    }

    /// Check the anchors the rewriting helpers rely on.
    fn validate(self, text: &str) -> Result<()> {
        let fail = |detail: &str| CatchError::configuration(self.key(), detail);

        match self {
            Self::Parameters => sql::reverse_lookup(text).map(drop),
            Self::Operations | Self::ParameterList | Self::OperationList | Self::Catches(_) => {
                if sql::find_word(text, "FROM", 0).is_none() {
                    return Err(fail("no FROM clause"));
                }
                Ok(())
            }
            Self::Environments | Self::CatchIds(_) => {
                if sql::find_word(text, "FROM", 0).is_none() {
                    return Err(fail("no FROM clause"));
                }
                if sql::find_order_by(text).is_none() {
                    return Err(fail("rows must be ordered by ID with an explicit ORDER BY"));
                }
                Ok(())
            }
            Self::EnvironmentUpdate | Self::EnvironmentInsert | Self::CatchUpdate(_) => {
                if !text.contains(sql::PLACEHOLDER) {
                    return Err(fail("missing [?] column placeholder"));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Resolved template set: built-in defaults with validated overrides.
#[derive(Debug, Clone)]
pub struct SqlTemplates {
    overrides: BTreeMap<Template, String>,
    parameter_by_name: String,
}

impl SqlTemplates {
    /// Resolve every template against `preferences` and validate the result.
    ///
    /// Keys that name no known template are rejected, as are templates
    /// missing the anchors the rewriting helpers need.
    pub fn new(preferences: &Preferences) -> Result<Self> {
        let mut overrides = BTreeMap::new();
        for key in preferences.keys() {
            let template = Template::ALL
                .into_iter()
                .find(|candidate| candidate.key() == key)
                .ok_or_else(|| CatchError::configuration(key, "unknown template key"))?;
            if let Some(text) = preferences.get(key) {
                overrides.insert(template, text.to_owned());
            }
        }
        let mut templates = Self {
            overrides,
            parameter_by_name: String::new(),
        };
        for template in Template::ALL {
            template.validate(templates.get(template))?;
        }
        templates.parameter_by_name = sql::reverse_lookup(templates.get(Template::Parameters))?;
        tracing::debug!(overrides = templates.overrides.len(), "templates.resolved");
        Ok(templates)
    }

    /// Text of `template`: the override when one is set, else the default.
    #[must_use]
    pub fn get(&self, template: Template) -> &str {
        self.overrides
            .get(&template)
            .map_or_else(|| template.default_sql(), String::as_str)
    }

    /// Parameter lookup rewritten to go from name to code.
    #[must_use]
    pub fn parameter_by_name(&self) -> &str {
        &self.parameter_by_name
    }

    #[must_use]
    pub fn is_overridden(&self, template: Template) -> bool {
        self.overrides.contains_key(&template)
    }
}

impl Default for SqlTemplates {
    fn default() -> Self {
        Self {
            overrides: BTreeMap::new(),
            parameter_by_name: "SELECT ID, name FROM Parameters WHERE name=?".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let templates = SqlTemplates::new(&Preferences::new()).unwrap();
        for template in Template::ALL {
            assert_eq!(templates.get(template), template.default_sql());
            assert!(!templates.is_overridden(template));
        }
        assert_eq!(
            templates.parameter_by_name(),
            SqlTemplates::default().parameter_by_name()
        );
    }

    #[test]
    fn keys_are_unique() {
        let mut keys: Vec<_> = Template::ALL.iter().map(|t| t.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), Template::ALL.len());
        assert_eq!(Template::CatchIds(CatchKind::Seine).key(), "Seines:ID");
        assert_eq!(
            Template::CatchUpdate(CatchKind::Longline).to_string(),
            "Longlines:UPDATE"
        );
    }

    #[test]
    fn override_replaces_default() {
        let mut prefs = Preferences::new();
        prefs.set(
            "Parameters",
            "SELECT code, label FROM Params WHERE code=?",
        );
        let templates = SqlTemplates::new(&prefs).unwrap();
        assert!(templates.is_overridden(Template::Parameters));
        assert_eq!(
            templates.parameter_by_name(),
            "SELECT code, label FROM Params WHERE label=?"
        );
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut prefs = Preferences::new();
        prefs.set("Trawls", "SELECT ID FROM Trawls");
        let err = SqlTemplates::new(&prefs).unwrap_err();
        assert!(matches!(err, CatchError::Configuration { template, .. } if template == "Trawls"));
    }

    #[test]
    fn environment_template_needs_order_by() {
        let mut prefs = Preferences::new();
        prefs.set(
            "Environments",
            "SELECT ID FROM Environments WHERE position=? AND timeLag=? AND parameter=?",
        );
        let err = SqlTemplates::new(&prefs).unwrap_err();
        assert!(matches!(
            err,
            CatchError::Configuration { template, .. } if template == "Environments"
        ));
    }

    #[test]
    fn lookup_template_needs_key_in_where() {
        let mut prefs = Preferences::new();
        prefs.set("Parameters", "SELECT ID, name FROM Parameters WHERE code=?");
        assert!(SqlTemplates::new(&prefs).is_err());
    }

    #[test]
    fn update_template_needs_placeholder() {
        let mut prefs = Preferences::new();
        prefs.set("Seines:UPDATE", "UPDATE Seines SET ALB=? WHERE ID=?");
        assert!(SqlTemplates::new(&prefs).is_err());
    }
}
