use anyhow::{Context, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use unic_langid::LanguageIdentifier;

pub const DEFAULT_LANGUAGE: &str = "en";

/// Resources compiled into the binary
const EMBEDDED_RESOURCES: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en/main.ftl")),
    ("fr", include_str!("../locales/fr/main.ftl")),
];

/// Localization manager for the bot's user-facing text
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a localization manager from the embedded resources
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();
        for (language, source) in EMBEDDED_RESOURCES {
            bundles.insert(
                language.to_string(),
                Self::create_bundle(language, source.to_string())?,
            );
        }
        Ok(Self { bundles })
    }

    /// Create a localization manager, replacing embedded resources with
    /// `<dir>/<lang>/main.ftl` files that exist
    pub fn with_resource_dir(dir: &Path) -> Result<Self> {
        let mut manager = Self::new()?;
        for (language, _) in EMBEDDED_RESOURCES {
            let resource_path = dir.join(language).join("main.ftl");
            match fs::read_to_string(&resource_path) {
                Ok(content) => {
                    debug!("Loading locale override from {}", resource_path.display());
                    manager
                        .bundles
                        .insert(language.to_string(), Self::create_bundle(language, content)?);
                }
                Err(e) => {
                    warn!(
                        "No locale override at {} ({}), using embedded resource",
                        resource_path.display(),
                        e
                    );
                }
            }
        }
        Ok(manager)
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(language: &str, content: String) -> Result<FluentBundle<FluentResource>> {
        let locale: LanguageIdentifier = language
            .parse()
            .with_context(|| format!("Invalid language identifier: {language}"))?;
        let mut bundle = FluentBundle::new_concurrent(vec![locale]);
        // Keep placeables free of Unicode isolation marks
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(content)
            .map_err(|(_, errors)| anyhow::anyhow!("Invalid Fluent resource for {language}: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow::anyhow!("Duplicate Fluent messages for {language}: {errors:?}"))?;

        Ok(bundle)
    }

    pub fn is_language_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    /// Normalize a Telegram language code (`fr-CA` -> `fr`) to a supported language
    pub fn resolve_language<'a>(&self, language_code: Option<&'a str>) -> &'a str {
        match language_code {
            Some(code) => {
                let primary = code.split(['-', '_']).next().unwrap_or(code);
                if self.is_language_supported(primary) {
                    primary
                } else {
                    DEFAULT_LANGUAGE
                }
            }
            None => DEFAULT_LANGUAGE,
        }
    }

    /// Get a localized message, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let bundle = self
            .bundles
            .get(language)
            .filter(|bundle| bundle.has_message(key))
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE));

        let Some(bundle) = bundle else {
            return format!("Missing translation: {key}");
        };

        let Some(msg) = bundle.get_message(key) else {
            return format!("Missing translation: {key}");
        };

        let Some(pattern) = msg.value() else {
            return format!("Missing value for key: {key}");
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (k, v) in args {
                fluent_args.set(*k, FluentValue::from(*v));
            }
            fluent_args
        });

        let mut value = String::new();
        let mut errors = vec![];
        if bundle
            .write_pattern(&mut value, pattern, fluent_args.as_ref(), &mut errors)
            .is_err()
            || !errors.is_empty()
        {
            warn!("Formatting {} in {} reported errors: {:?}", key, language, errors);
        }

        value
    }

    /// Get a localized message for an optional Telegram language code
    pub fn text(&self, key: &str, language_code: Option<&str>) -> String {
        let language = self.resolve_language(language_code);
        self.get_message_in_language(key, language, None)
    }

    /// Get a localized message with simple string arguments
    pub fn text_args(&self, key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
        let language = self.resolve_language(language_code);
        let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
        self.get_message_in_language(key, language, Some(&args_map))
    }
}
