/// ETL Pipeline Module
///
/// The four per-(window, dataset) steps of the regeneration pipeline:
/// - extract: render the dataset's query template and run it at the source
/// - serialize: turn the result set into a CSV payload, or signal "empty"
/// - stage: upload the payload under a unique, traceable name
/// - replace: delete the destination slice, then load the staged file
pub mod extract;
pub mod replace;
pub mod serialize;
pub mod stage;
