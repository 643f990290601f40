//! WASM front end for patient status checks.
//!
//! Binds the status check controller to the page's file inputs, loading
//! indicator and result panel, which the page hands over explicitly.

mod console;

use roster_core::{
    BlobSource, CheckConfig, Controller, Error, MatchResult, NameNormalizer, RunOutcome,
    StatusChecker, StatusView,
};
use roster_pdf::PdfTextExtractor;
use roster_xlsx::XlsxParser;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{File, HtmlElement, HtmlInputElement};

#[wasm_bindgen(start)]
pub fn init() {
    // Set up better panic messages in the console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    console::init(log::LevelFilter::Info);
}

/// Change the console log level ("error", "warn", "info", "debug", "trace", "off").
#[wasm_bindgen]
pub fn set_log_level(level: &str) {
    console::init(console::parse_level(level));
}

/// A file `<input>` on the page.
struct FileInput {
    element: HtmlInputElement,
}

impl FileInput {
    fn selected(&self) -> Option<File> {
        self.element.files().and_then(|files| files.get(0))
    }
}

impl BlobSource for FileInput {
    fn is_present(&self) -> bool {
        self.selected().is_some()
    }

    async fn read(&self) -> roster_core::Result<Vec<u8>> {
        let file = self
            .selected()
            .ok_or_else(|| Error::MissingInput(format!("no file in #{}", self.element.id())))?;

        let buffer = JsFuture::from(file.array_buffer()).await.map_err(|e| {
            Error::IoError(std::io::Error::other(format!(
                "Failed to read {}: {:?}",
                file.name(),
                e
            )))
        })?;

        Ok(js_sys::Uint8Array::new(&buffer).to_vec())
    }

    fn reset(&mut self) {
        self.element.set_value("");
    }
}

/// Loading indicator and result panel.
struct PageView {
    loading: HtmlElement,
    result: HtmlElement,
}

impl StatusView for PageView {
    fn set_busy(&mut self, busy: bool) {
        let display = if busy { "block" } else { "none" };
        if let Err(e) = self.loading.style().set_property("display", display) {
            log::warn!("Failed to toggle loading indicator: {:?}", e);
        }
    }

    fn show_message(&mut self, message: &str) {
        self.result.set_inner_text(message);
    }

    fn show_markup(&mut self, markup: &str) {
        self.result.set_inner_html(markup);
    }

    fn clear(&mut self) {
        self.result.set_inner_html("");
    }
}

/// The status page: two file inputs, a loading indicator and a result panel.
#[wasm_bindgen]
pub struct StatusPage {
    pdf_input: HtmlInputElement,
    sheet_input: HtmlInputElement,
    loading: HtmlElement,
    result: HtmlElement,
    config: CheckConfig,
}

#[wasm_bindgen]
impl StatusPage {
    /// Bind a page. `options` is an optional object with `pattern`,
    /// `normalize_extracted`, `policy` ("substring" or "exact") and
    /// `columns: { name, status }`.
    #[wasm_bindgen(constructor)]
    pub fn new(
        pdf_input: HtmlInputElement,
        sheet_input: HtmlInputElement,
        loading: HtmlElement,
        result: HtmlElement,
        options: JsValue,
    ) -> Result<StatusPage, JsValue> {
        let config = parse_options(options)?;
        // Reject a bad pattern now rather than on every click.
        new_checker(&config)?;

        Ok(StatusPage {
            pdf_input,
            sheet_input,
            loading,
            result,
            config,
        })
    }

    /// Check the selected files and fill the result panel.
    ///
    /// Resolves to the array of `{extracted, name, status}` results, or to
    /// `null` when files were missing or processing failed.
    pub fn check(&self) -> Result<js_sys::Promise, JsValue> {
        let mut controller = self.controller()?;

        Ok(wasm_bindgen_futures::future_to_promise(async move {
            match controller.run().await {
                RunOutcome::Completed(results) => to_js(&results),
                RunOutcome::MissingInput | RunOutcome::Failed(_) => Ok(JsValue::NULL),
            }
        }))
    }

    /// Empty the result panel and both file inputs.
    pub fn clear(&self) -> Result<(), JsValue> {
        self.controller()?.clear();
        Ok(())
    }
}

impl StatusPage {
    fn controller(&self) -> Result<Controller<FileInput, FileInput, PageView>, JsValue> {
        Ok(Controller::new(
            FileInput {
                element: self.pdf_input.clone(),
            },
            FileInput {
                element: self.sheet_input.clone(),
            },
            PageView {
                loading: self.loading.clone(),
                result: self.result.clone(),
            },
            new_checker(&self.config)?,
        ))
    }
}

/// Check in-memory file contents and return the results.
///
/// # Arguments
/// * `pdf` - The raw bytes of the appointment PDF
/// * `sheet` - The raw bytes of the roster workbook (.xlsx, .xls or .ods)
/// * `options` - Optional check options, as for `StatusPage`
///
/// # Returns
/// An array of `{extracted, name, status}`, or throws on error.
#[wasm_bindgen]
pub fn check_bytes(pdf: &[u8], sheet: &[u8], options: JsValue) -> Result<JsValue, JsValue> {
    let config = parse_options(options)?;
    let results = check_bytes_impl(pdf, sheet, &config).map_err(|e| JsValue::from_str(&e))?;
    to_js(&results)
}

/// Uppercase a name and strip its accents.
#[wasm_bindgen]
pub fn normalize_name(name: &str) -> String {
    NameNormalizer::new().normalize(name)
}

fn check_bytes_impl(
    pdf: &[u8],
    sheet: &[u8],
    config: &CheckConfig,
) -> Result<Vec<MatchResult>, String> {
    let checker = StatusChecker::new(PdfTextExtractor::new(), XlsxParser::new(), config)
        .map_err(|e| e.to_string())?;

    checker.check_bytes(pdf, sheet).map_err(|e| {
        log::error!("Error during execution: {}", e);
        e.to_string()
    })
}

fn new_checker(config: &CheckConfig) -> Result<StatusChecker, JsValue> {
    StatusChecker::new(PdfTextExtractor::new(), XlsxParser::new(), config)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

fn parse_options(options: JsValue) -> Result<CheckConfig, JsValue> {
    if options.is_undefined() || options.is_null() {
        return Ok(CheckConfig::default());
    }

    serde_wasm_bindgen::from_value(options)
        .map_err(|e| JsValue::from_str(&format!("Invalid options: {}", e)))
}

fn to_js(results: &[MatchResult]) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(results)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}
