//! Success detection from tool output.
//!
//! The flashing tools do not report failure reliably through their exit status, so outcomes
//! are read from marker strings in the combined output. The markers are configuration data.

use crate::config::MarkerConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeParser {
    success_markers: Vec<String>,
    failure_markers: Vec<String>,
}

impl OutcomeParser {
    pub fn new<I, J, S, T>(success: I, failure: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            success_markers: lowered(success),
            failure_markers: lowered(failure),
        }
    }

    /// Parser for `fastboot flash` output using the built-in markers.
    pub fn fastboot_flash() -> Self {
        Self::from_markers(&MarkerConfig::default())
    }

    pub fn from_markers(markers: &MarkerConfig) -> Self {
        Self::new(&markers.flash_success, &markers.flash_failure)
    }

    /// True when some success marker is present and no failure marker is.
    ///
    /// With the built-in markers the failure list is empty, so the success marker alone
    /// decides.
    pub fn succeeded(&self, output: &str) -> bool {
        let haystack = output.to_lowercase();
        let contains = |marker: &String| !marker.is_empty() && haystack.contains(marker.as_str());
        self.success_markers.iter().any(contains) && !self.failure_markers.iter().any(contains)
    }
}

fn lowered<I, S>(markers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    markers
        .into_iter()
        .map(|m| m.as_ref().to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_match_ignores_case() {
        let parser = OutcomeParser::fastboot_flash();
        assert!(parser.succeeded(
            "Sending 'boot_a' (65536 KB)  OKAY [  1.702s]\nWriting 'boot_a'  OKAY\nFinished. Total time: 2.140s"
        ));
    }

    #[test]
    fn bootloader_chatter_does_not_fail_a_flash() {
        let parser = OutcomeParser::fastboot_flash();
        let output = "(bootloader) slot b: previous boot failed, retrying\n\
                      Writing 'boot_a' OKAY [  0.302s]\n\
                      Finished. Total time: 1.200s";
        assert!(parser.succeeded(output));
    }

    #[test]
    fn missing_success_marker_is_failure() {
        let parser = OutcomeParser::fastboot_flash();
        assert!(!parser.succeeded("Sending 'vendor' FAILED (remote: 'partition not found')"));
    }

    #[test]
    fn configured_failure_marker_overrides_success() {
        let markers = MarkerConfig {
            flash_failure: vec!["FAILED (remote".to_string()],
            ..MarkerConfig::default()
        };
        let parser = OutcomeParser::from_markers(&markers);
        let output = "Sending 'vendor' FAILED (remote: 'partition not found')\nfinished. total time: 0.010s";
        assert!(!parser.succeeded(output));
        assert!(parser.succeeded("(bootloader) previous boot failed\nFinished. Total time: 1.2s"));
    }

    #[test]
    fn empty_or_garbage_output_is_failure() {
        let parser = OutcomeParser::fastboot_flash();
        assert!(!parser.succeeded(""));
        assert!(!parser.succeeded("< waiting for any device >"));
    }

    #[test]
    fn custom_markers_are_data() {
        let parser = OutcomeParser::new(["OKAY"], Vec::<String>::new());
        assert!(parser.succeeded("writing 'boot'... okay"));
    }
}
