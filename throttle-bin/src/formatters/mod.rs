pub(crate) mod color;
pub(crate) mod log;
pub(crate) mod report;

use self::report::ReportFormatter;
use crate::options::ReportFormat;

/// Create a report formatter for the given format option
pub(crate) fn get_report_formatter(format: ReportFormat) -> Box<dyn ReportFormatter> {
    match format {
        ReportFormat::Text => Box::new(report::Text),
        ReportFormat::Json => Box::new(report::Json),
    }
}
