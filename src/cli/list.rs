mod table;

use serde::Serialize;
use std::str::FromStr;

use table::{IntoTable, Table};

use crate::config::catalog::Catalog;
use crate::providers::providers::ProviderKind;

use crate::{ListArgs, ListObject, ListingFormat};

#[derive(Serialize)]
struct Provider {
    provider: String,
    enabled: bool,
    /// Whether requests can actually be sent, not just resolved
    adapter: bool,
    models: Vec<String>,
}

impl IntoTable for Vec<Provider> {
    fn into_table(self) -> Table {
        let mut tab = Table::with_header(&["PROVIDER", "STATUS", "ADAPTER", "MODELS"]);

        for provider in self {
            tab.add_row(vec![
                provider.provider,
                if provider.enabled { "enabled" } else { "disabled" }.to_string(),
                if provider.adapter { "yes" } else { "no" }.to_string(),
                if provider.models.is_empty() {
                    "-".to_string()
                } else {
                    provider.models.join(",")
                },
            ]);
        }

        tab
    }
}

#[derive(Serialize)]
struct Role {
    role: String,
    primary: String,
    fallbacks: Vec<String>,
    default: bool,
}

impl IntoTable for Vec<Role> {
    fn into_table(self) -> Table {
        let mut tab = Table::with_header(&["ROLE", "PRIMARY", "FALLBACKS"]);

        for role in self {
            let name = if role.default {
                format!("{}*", role.role)
            } else {
                role.role
            };

            tab.add_row(vec![
                name,
                role.primary,
                if role.fallbacks.is_empty() {
                    "-".to_string()
                } else {
                    role.fallbacks.join(",")
                },
            ]);
        }

        tab
    }
}

#[derive(Serialize)]
struct Alias {
    alias: String,
    provider: String,
    model: String,
}

impl IntoTable for Vec<Alias> {
    fn into_table(self) -> Table {
        let mut tab = Table::with_header(&["ALIAS", "PROVIDER", "MODEL"]);

        for alias in self {
            tab.add_row(vec![alias.alias, alias.provider, alias.model]);
        }

        tab
    }
}

fn get_providers(catalog: &Catalog) -> Vec<Provider> {
    catalog
        .providers
        .iter()
        .map(|(name, entry)| Provider {
            provider: name.clone(),
            enabled: entry.enabled,
            adapter: ProviderKind::from_str(name).is_ok(),
            models: entry.models.iter().cloned().collect(),
        })
        .collect()
}

fn get_roles(catalog: &Catalog) -> Vec<Role> {
    catalog
        .roles
        .iter()
        .map(|(name, policy)| Role {
            role: name.clone(),
            primary: policy.primary.to_string(),
            fallbacks: policy.fallbacks.iter().map(|c| c.to_string()).collect(),
            default: catalog.defaults.role.as_ref() == Some(name),
        })
        .collect()
}

fn get_aliases(catalog: &Catalog) -> Vec<Alias> {
    catalog
        .aliases
        .iter()
        .map(|(name, target)| Alias {
            alias: name.clone(),
            provider: target.provider.clone(),
            model: target.model.clone(),
        })
        .collect()
}

fn format_output<O: IntoTable + Serialize>(object: O, format: ListingFormat) {
    match format {
        ListingFormat::Json => match serde_json::to_string_pretty(&object) {
            Ok(output) => println!("{}", output),
            Err(err) => crate::die!("failed to serialize listing: {}", err),
        },
        ListingFormat::Table => print!("{}", object.into_table()),
        ListingFormat::HeaderlessTable => {
            let mut tab = object.into_table();

            tab.print_header(false);

            print!("{}", tab);
        }
    }
}

pub(crate) fn list_cmd(catalog: &Catalog, args: &ListArgs) -> i32 {
    match args.object {
        ListObject::Providers => format_output(get_providers(catalog), args.format),
        ListObject::Roles => format_output(get_roles(catalog), args.format),
        ListObject::Aliases => format_output(get_aliases(catalog), args.format),
    }

    0
}
