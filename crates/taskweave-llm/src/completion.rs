//! Post-processing of raw provider output

/// Strip an echoed prompt from the front of `raw` and truncate at the
/// earliest occurrence of any stop sequence.
pub fn finalize_completion(prompt: &str, raw: &str, stop_sequences: &[String]) -> String {
    let body = if prompt.is_empty() {
        raw
    } else {
        raw.strip_prefix(prompt).unwrap_or(raw)
    };

    let cut = stop_sequences
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| body.find(s.as_str()))
        .min()
        .unwrap_or(body.len());

    body[..cut].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_echoed_prompt() {
        assert_eq!(finalize_completion("hello", "hello world", &[]), " world");
    }

    #[test]
    fn leaves_unechoed_output_alone() {
        assert_eq!(finalize_completion("hello", "goodbye", &[]), "goodbye");
    }

    #[test]
    fn truncates_at_earliest_stop() {
        let stops = vec!["END".to_string(), "\n\n".to_string()];
        assert_eq!(finalize_completion("", "a\n\nb END", &stops), "a");
        assert_eq!(finalize_completion("", "a END\n\nb", &stops), "a ");
    }

    #[test]
    fn empty_stop_sequence_ignored() {
        let stops = vec![String::new()];
        assert_eq!(finalize_completion("", "abc", &stops), "abc");
    }
}
