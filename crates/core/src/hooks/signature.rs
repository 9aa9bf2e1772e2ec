use serde::{Deserialize, Serialize};

use crate::settings::EffectiveSettings;

/// Placeholder replaced by the namespace half of the frame class.
pub const NAMESPACE_PLACEHOLDER: &str = "{namespace}";

/// Placeholder replaced by the class half of the frame class.
pub const CLASS_PLACEHOLDER: &str = "{class}";

pub const POINTER_MOVED_TEMPLATE: &str = "public: virtual int __cdecl winrt::impl::produce<struct winrt::{namespace}::implementation::{class},struct winrt::Windows::UI::Xaml::Controls::IControlOverrides>::OnPointerMoved(void *)";

pub const POINTER_EXITED_TEMPLATE: &str = "public: virtual int __cdecl winrt::impl::produce<struct winrt::{namespace}::implementation::{class},struct winrt::Windows::UI::Xaml::Controls::IControlOverrides>::OnPointerExited(void *)";

/// Symbols under which the loader entry point may be exported.
pub const LOAD_LIBRARY_SIGNATURES: &[&str] = &["LoadLibraryExW", "__imp_LoadLibraryExW"];

/// Module that exports the loader entry point.
pub const LOADER_MODULE: &str = "kernelbase.dll";

/// Textual symbol pattern with substitutable namespace/class fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureTemplate {
    pattern: String,
}

impl SignatureTemplate {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self { pattern: pattern.into() }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn render(&self, namespace: &str, class: &str) -> String {
        self.pattern.replace(NAMESPACE_PLACEHOLDER, namespace).replace(CLASS_PLACEHOLDER, class)
    }
}

/// Templates for the two frame handlers that get hooked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSignatures {
    pub pointer_moved: SignatureTemplate,
    pub pointer_exited: SignatureTemplate,
}

impl Default for FrameSignatures {
    fn default() -> Self {
        Self {
            pointer_moved: SignatureTemplate::new(POINTER_MOVED_TEMPLATE),
            pointer_exited: SignatureTemplate::new(POINTER_EXITED_TEMPLATE),
        }
    }
}

/// Concrete signatures for one frame class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedSignatures {
    pub pointer_moved: String,
    pub pointer_exited: String,
}

impl FrameSignatures {
    pub fn render(&self, settings: &EffectiveSettings) -> RenderedSignatures {
        RenderedSignatures {
            pointer_moved: self.pointer_moved.render(&settings.namespace, &settings.class),
            pointer_exited: self.pointer_exited.render(&settings.namespace, &settings.class),
        }
    }
}
