//! Byte scanner over ASCII source.

/// Returned when the cursor is past the end of the source.
///
/// A NUL byte inside the source also terminates the input.
pub(crate) const EOF_CHAR: u8 = b'\0';

pub(crate) struct Cursor<'a> {
    source: &'a [u8],
    /// Byte offset of the current character.
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
            offset: 0,
        }
    }

    /// Character under the cursor.
    #[inline]
    pub(crate) fn current(&self) -> u8 {
        self.source.get(self.offset).copied().unwrap_or(EOF_CHAR)
    }

    /// Consume the current character and return it.
    ///
    /// Stays put at the end of the source.
    #[inline]
    pub(crate) fn bump(&mut self) -> u8 {
        let c = self.current();
        if c != EOF_CHAR {
            self.offset += 1;
        }
        c
    }

    /// Consume the current character if it equals `expected`.
    #[inline]
    pub(crate) fn eat(&mut self, expected: u8) -> bool {
        if self.current() == expected && expected != EOF_CHAR {
            self.offset += 1;
            true
        } else {
            false
        }
    }

    #[inline]
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    /// Source bytes from `start` up to, but excluding, the cursor.
    #[inline]
    pub(crate) fn fragment(&self, start: usize) -> &'a [u8] {
        &self.source[start..self.offset]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cursor_stops_at_end() {
        let mut cursor = Cursor::new("ab");
        assert_eq!(cursor.bump(), b'a');
        assert_eq!(cursor.bump(), b'b');
        assert_eq!(cursor.bump(), EOF_CHAR);
        assert_eq!(cursor.bump(), EOF_CHAR);
        assert_eq!(cursor.offset(), 2);
        assert_eq!(cursor.fragment(0), b"ab");
    }

    #[test]
    fn test_cursor_eat() {
        let mut cursor = Cursor::new("==");
        assert!(cursor.eat(b'='));
        assert!(!cursor.eat(b'!'));
        assert!(cursor.eat(b'='));
        assert!(!cursor.eat(EOF_CHAR));
    }
}
