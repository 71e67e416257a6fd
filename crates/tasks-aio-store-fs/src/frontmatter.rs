/// Split a document into its YAML front matter and body.
///
/// Front matter must open on the first line with `---` and close with a line
/// holding only `---`. Returns `None` when the document has no complete block.
#[must_use]
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_block_from_body() {
        let content = "---\nstatus: done\ntags: [a]\n---\n# Title\n- [ ] task\n";
        assert_eq!(
            split_frontmatter(content),
            Some(("status: done\ntags: [a]\n", "# Title\n- [ ] task\n"))
        );
    }

    #[test]
    fn handles_empty_block_crlf_and_eof_fence() {
        assert_eq!(split_frontmatter("---\n---\nbody"), Some(("", "body")));
        assert_eq!(split_frontmatter("---\r\na: 1\r\n---\r\nbody"), Some(("a: 1\r\n", "body")));
        assert_eq!(split_frontmatter("---\na: 1\n---"), Some(("a: 1\n", "")));
    }

    #[test]
    fn rejects_unterminated_or_late_blocks() {
        assert_eq!(split_frontmatter("---\na: 1\nbody"), None);
        assert_eq!(split_frontmatter("# Title\n---\na: 1\n---\n"), None);
        assert_eq!(split_frontmatter(""), None);
    }
}
