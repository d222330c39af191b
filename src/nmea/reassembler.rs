/// Rebuilds complete lines from arbitrarily fragmented text chunks.
///
/// Holds at most one pending partial line between calls. A pending line is
/// dropped when the next chunk starts a new sentence instead of continuing it.
#[derive(Debug, Clone, Default)]
pub struct SentenceReassembler {
    pending: String,
}

impl SentenceReassembler {
    /// Reassembler with nothing pending
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk, returning the sentences it completed in arrival order.
    ///
    /// Yielded sentences have their line terminator removed.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        let mut pieces: Vec<String> = chunk.split('\n').map(str::to_string).collect();
        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            match pieces.first_mut() {
                Some(first) if !first.starts_with('$') => first.insert_str(0, &pending),
                _ => log::debug!("Discarding partial line {:?}", pending),
            }
        }

        if let Some(last) = pieces.pop() {
            if last.ends_with('\r') {
                pieces.push(last);
            } else {
                self.pending = last;
            }
        }

        pieces
            .into_iter()
            .map(|piece| match piece.strip_suffix('\r') {
                Some(line) => line.to_string(),
                None => piece,
            })
            // blank lines would only fail the checksum downstream
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// The partial line waiting for more data
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Forget any partial line
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";

    #[test]
    fn split_across_two_chunks() {
        let mut whole = SentenceReassembler::new();
        let expected = whole.feed(&format!("{GGA}\r\n"));
        assert_eq!(expected, vec![GGA.to_string()]);

        let mut split = SentenceReassembler::new();
        assert!(split.feed("$GPGGA,1").is_empty());
        assert_eq!(split.pending(), "$GPGGA,1");
        assert_eq!(split.feed(&format!("{}\r\n", &GGA[8..])), expected);
        assert_eq!(split.pending(), "");
    }

    #[test]
    fn several_lines_in_one_chunk() {
        let mut reassembler = SentenceReassembler::new();
        let lines = reassembler.feed("$PGRMZ,93,f,3*21\r\n$HCHDG,101.1,,,7.1,W*3C\r\n$GPHDT,1");
        assert_eq!(lines, vec!["$PGRMZ,93,f,3*21", "$HCHDG,101.1,,,7.1,W*3C"]);
        assert_eq!(reassembler.pending(), "$GPHDT,1");
    }

    #[test]
    fn carriage_return_ends_a_chunk() {
        let mut reassembler = SentenceReassembler::new();
        assert_eq!(reassembler.feed("$PGRMZ,93,f,3*21\r"), vec!["$PGRMZ,93,f,3*21"]);
        assert!(reassembler.feed("\n").is_empty());
        assert_eq!(reassembler.pending(), "");
    }

    #[test]
    fn new_sentence_discards_fragment() {
        let mut reassembler = SentenceReassembler::new();
        reassembler.feed("$GPGGA,1235");
        let lines = reassembler.feed("$PGRMZ,93,f,3*21\r\n");
        assert_eq!(lines, vec!["$PGRMZ,93,f,3*21"]);
    }

    #[test]
    fn blank_lines_yield_nothing() {
        let mut reassembler = SentenceReassembler::new();
        let lines = reassembler.feed("\r\n\n$PGRMZ,93,f,3*21\r\n\r\n");
        assert_eq!(lines, vec!["$PGRMZ,93,f,3*21".to_string()]);
        assert_eq!(reassembler.pending(), "");
    }

    #[test]
    fn reset_drops_pending() {
        let mut reassembler = SentenceReassembler::new();
        reassembler.feed("$GPGGA,1235");
        reassembler.reset();
        assert_eq!(reassembler.feed("19\r\n"), vec!["19"]);
    }
}
