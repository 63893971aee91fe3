/// Extract Module
///
/// Renders a dataset's stored query template for a window and executes it
/// against the source database. Templates carry two literal placeholders
/// that are substituted with the window bounds in ISO-8601 form.
use crate::db::{QueryResult, SourceClient};
use crate::errors::RegenError;
use crate::window::TimeWindow;

pub const INI_PLACEHOLDER: &str = "#INI_DATE#";
pub const END_PLACEHOLDER: &str = "#END_DATE#";

/// Substitute the window bounds into a query template and trim the
/// result. Both placeholders must be present; a template missing either
/// one would silently query the wrong slice, so this fails fast.
pub fn render_query(dataset: &str, template: &str, window: &TimeWindow) -> Result<String, RegenError> {
    if !template.contains(INI_PLACEHOLDER) || !template.contains(END_PLACEHOLDER) {
        return Err(RegenError::Configuration(format!(
            "query template for [{}] must contain both {} and {}",
            dataset, INI_PLACEHOLDER, END_PLACEHOLDER
        )));
    }

    let query = template
        .replace(INI_PLACEHOLDER, &window.ini_string())
        .replace(END_PLACEHOLDER, &window.end_string())
        .trim()
        .to_string();

    Ok(query)
}

/// Run the rendered extraction query for one (dataset, window) pair.
/// A failure here is fatal to the run: the connection is shared and an
/// execution error indicates a systemic problem, not a per-window one.
pub async fn extract<S: SourceClient>(
    source: &S,
    dataset: &str,
    template: &str,
    window: &TimeWindow,
) -> Result<QueryResult, RegenError> {
    let query = render_query(dataset, template, window)?;
    let result = source.execute(&query).await?;

    tracing::debug!("Extracted {} rows for [{}] in window {}", result.rows.len(), dataset, window);
    Ok(result)
}
