//! Orchestration of a status check run.
//!
//! The [`Controller`] owns handles to both inputs and to the view it reports
//! to; nothing is looked up globally. A run validates that both inputs are
//! present, reads and parses them concurrently, extracts and matches names,
//! and renders the results. Failures are logged in full and shown to the user
//! only as a generic message.

use std::ops::{Deref, DerefMut};

use crate::config::{CheckConfig, RosterColumns};
use crate::error::{Error, Result};
use crate::extract::NameExtractor;
use crate::matcher::NameMatcher;
use crate::render::{HtmlRenderer, ResultRenderer};
use crate::types::{MatchResult, Roster};

/// Prompt shown when a run is attempted without both files.
pub const MISSING_INPUT_MESSAGE: &str = "Please upload both PDF and Excel files.";

/// Message shown when a run fails; details go to the log only.
pub const FAILURE_MESSAGE: &str =
    "An error occurred during processing. Check console for details.";

/// A user-supplied file, read in full on demand.
#[allow(async_fn_in_trait)]
pub trait BlobSource {
    /// Whether a file is currently selected.
    fn is_present(&self) -> bool;

    /// Read the whole file.
    async fn read(&self) -> Result<Vec<u8>>;

    /// Forget the current selection.
    fn reset(&mut self) {}
}

/// Produces the concatenated text of a binary document.
pub trait TextExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String>;
}

/// Produces roster records from a binary spreadsheet.
pub trait RosterParser {
    fn parse_roster(&self, bytes: &[u8], columns: &RosterColumns) -> Result<Roster>;
}

/// Where a run reports its progress and results.
pub trait StatusView {
    fn set_busy(&mut self, busy: bool);

    /// Show plain text in the result area.
    fn show_message(&mut self, message: &str);

    /// Show rendered results in the result area.
    fn show_markup(&mut self, markup: &str);

    /// Empty the result area.
    fn clear(&mut self);
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// One or both inputs were absent; nothing was processed.
    MissingInput,
    /// Reading, parsing or matching failed.
    Failed(Error),
    /// Results were rendered.
    Completed(Vec<MatchResult>),
}

impl RunOutcome {
    pub fn results(&self) -> Option<&[MatchResult]> {
        match self {
            Self::Completed(results) => Some(results),
            _ => None,
        }
    }
}

/// The extraction and matching pipeline, independent of any view.
pub struct StatusChecker {
    extractor: Box<dyn TextExtractor>,
    parser: Box<dyn RosterParser>,
    names: NameExtractor,
    matcher: NameMatcher,
    columns: RosterColumns,
}

impl StatusChecker {
    /// Build a checker; fails if the configured pattern is invalid.
    pub fn new(
        extractor: impl TextExtractor + 'static,
        parser: impl RosterParser + 'static,
        config: &CheckConfig,
    ) -> Result<Self> {
        let names =
            NameExtractor::new(&config.pattern)?.with_normalized_output(config.normalize_extracted);

        Ok(Self {
            extractor: Box::new(extractor),
            parser: Box::new(parser),
            names,
            matcher: NameMatcher::new(config.policy),
            columns: config.columns.clone(),
        })
    }

    /// Read both inputs concurrently, then extract and match.
    pub async fn check<D, R>(&self, document: &D, roster: &R) -> Result<Vec<MatchResult>>
    where
        D: BlobSource,
        R: BlobSource,
    {
        let (text, roster) = futures::join!(self.read_text(document), self.read_roster(roster));
        Ok(self.check_text(&text?, &roster?))
    }

    /// Run the pipeline on in-memory file contents.
    pub fn check_bytes(&self, document: &[u8], roster: &[u8]) -> Result<Vec<MatchResult>> {
        let text = self.extractor.extract_text(document)?;
        let roster = self.parser.parse_roster(roster, &self.columns)?;
        Ok(self.check_text(&text, &roster))
    }

    /// Extract names from document text and resolve each against the roster.
    pub fn check_text(&self, text: &str, roster: &Roster) -> Vec<MatchResult> {
        let names = self.names.extract_names(text);
        self.matcher.resolve_all(&names, roster)
    }

    async fn read_text<D: BlobSource>(&self, document: &D) -> Result<String> {
        let bytes = document.read().await?;
        let text = self.extractor.extract_text(&bytes)?;
        log::debug!("Document text: {} chars", text.len());
        Ok(text)
    }

    async fn read_roster<R: BlobSource>(&self, roster: &R) -> Result<Roster> {
        let bytes = roster.read().await?;
        self.parser.parse_roster(&bytes, &self.columns)
    }
}

/// Shows the busy indicator for as long as it lives.
struct BusyGuard<'a, V: StatusView> {
    view: &'a mut V,
}

impl<'a, V: StatusView> BusyGuard<'a, V> {
    fn new(view: &'a mut V) -> Self {
        view.set_busy(true);
        Self { view }
    }
}

impl<V: StatusView> Deref for BusyGuard<'_, V> {
    type Target = V;

    fn deref(&self) -> &V {
        self.view
    }
}

impl<V: StatusView> DerefMut for BusyGuard<'_, V> {
    fn deref_mut(&mut self) -> &mut V {
        self.view
    }
}

impl<V: StatusView> Drop for BusyGuard<'_, V> {
    fn drop(&mut self) {
        self.view.set_busy(false);
    }
}

/// Drives one status page: two inputs, one view.
pub struct Controller<D, R, V> {
    document: D,
    roster: R,
    view: V,
    checker: StatusChecker,
    renderer: Box<dyn ResultRenderer>,
}

impl<D, R, V> Controller<D, R, V>
where
    D: BlobSource,
    R: BlobSource,
    V: StatusView,
{
    /// Create a controller rendering HTML.
    pub fn new(document: D, roster: R, view: V, checker: StatusChecker) -> Self {
        Self {
            document,
            roster,
            view,
            checker,
            renderer: Box::new(HtmlRenderer::new()),
        }
    }

    pub fn with_renderer(mut self, renderer: impl ResultRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn into_view(self) -> V {
        self.view
    }

    /// Check the selected files and show the results.
    pub async fn run(&mut self) -> RunOutcome {
        if !self.document.is_present() || !self.roster.is_present() {
            self.view.show_message(MISSING_INPUT_MESSAGE);
            return RunOutcome::MissingInput;
        }

        let mut view = BusyGuard::new(&mut self.view);
        view.clear();

        match self.checker.check(&self.document, &self.roster).await {
            Ok(results) => {
                view.show_markup(&self.renderer.render(&results));
                RunOutcome::Completed(results)
            }
            Err(e) => {
                log::error!("Error during execution: {}", e);
                view.show_message(FAILURE_MESSAGE);
                RunOutcome::Failed(e)
            }
        }
    }

    /// Empty the results and forget both file selections.
    pub fn clear(&mut self) {
        self.view.clear();
        self.document.reset();
        self.roster.reset();
    }
}
