//! Localized user-facing messages backed by Fluent resources.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use lazy_static::lazy_static;
use unic_langid::LanguageIdentifier;

const FALLBACK_LANGUAGE: &str = "en";

const RESOURCES: [(&str, &str); 2] = [
    ("en", include_str!("../locales/en/main.ftl")),
    ("zh-TW", include_str!("../locales/zh-TW/main.ftl")),
];

/// Localization manager for the vocabulary bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a manager holding every embedded locale
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (tag, source) in RESOURCES {
            let locale: LanguageIdentifier = tag.parse()?;
            bundles.insert(tag.to_string(), Self::create_bundle(locale, source)?);
        }

        Ok(Self { bundles })
    }

    fn create_bundle(locale: LanguageIdentifier, source: &str) -> Result<FluentBundle<FluentResource>> {
        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Invalid Fluent resource for {locale}: {errors:?}"))?;

        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Replies are plain chat text; no bidi isolation marks around arguments
        bundle.set_use_isolating(false);
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Duplicate Fluent messages for {locale}: {errors:?}"))?;

        Ok(bundle)
    }

    fn bundle_for(&self, language: Option<&str>) -> Option<&FluentBundle<FluentResource>> {
        language
            .and_then(|lang| {
                self.bundles.get(lang).or_else(|| {
                    // "zh" or "zh-Hant-TW" style tags fall back on the primary subtag match
                    let primary = lang.split(['-', '_']).next().unwrap_or(lang);
                    self.bundles
                        .iter()
                        .find(|(tag, _)| tag.split('-').next() == Some(primary))
                        .map(|(_, bundle)| bundle)
                })
            })
            .or_else(|| self.bundles.get(FALLBACK_LANGUAGE))
    }

    /// Get a localized message
    pub fn get_message(&self, key: &str, args: Option<&FluentArgs>, language: Option<&str>) -> String {
        let Some(bundle) = self.bundle_for(language) else {
            return format!("Missing translation: {key}");
        };

        let pattern = match bundle.get_message(key).and_then(|msg| msg.value()) {
            Some(pattern) => pattern,
            None => return format!("Missing translation: {key}"),
        };

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, args, &mut errors);
        if !errors.is_empty() {
            tracing::warn!(key, errors = ?errors, "Fluent formatting errors");
        }
        value.into_owned()
    }
}

lazy_static! {
    static ref LOCALIZATION: Option<LocalizationManager> = LocalizationManager::new()
        .map_err(|e| tracing::error!(error = %e, "Failed to load localization resources"))
        .ok();
}

/// Localized message in the given language (English when unknown)
pub fn t_lang(key: &str, language: Option<&str>) -> String {
    match LOCALIZATION.as_ref() {
        Some(manager) => manager.get_message(key, None, language),
        None => key.to_string(),
    }
}

/// Localized message with string arguments
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language: Option<&str>) -> String {
    let mut fluent_args = FluentArgs::new();
    for (name, value) in args {
        fluent_args.set(*name, FluentValue::from(*value));
    }
    match LOCALIZATION.as_ref() {
        Some(manager) => manager.get_message(key, Some(&fluent_args), language),
        None => key.to_string(),
    }
}
