/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::io::{BufRead, Read};

/// Trait for types that can provide the current position in a stream. This
/// is intentionally a subset of the Seek trait, as it only requires remembering
/// the current position without allowing seeking to arbitrary positions.
pub trait StreamPosition {
    /// Returns the current position in the stream.
    fn position(&mut self) -> u64;
}

/// Wraps a BufRead and counts the bytes consumed from it, so that metadata segments
/// can be reported with their absolute offset even if the source can't seek.
pub struct CountingReader<R> {
    inner: R,
    position: u64,
}

impl<R: BufRead> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        CountingReader { inner, position: 0 }
    }
}

impl<R> StreamPosition for CountingReader<R> {
    fn position(&mut self) -> u64 {
        self.position
    }
}

impl<R: BufRead> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<R: BufRead> BufRead for CountingReader<R> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.position += amt as u64;
        self.inner.consume(amt)
    }
}

#[test]
fn test_counting() {
    let data = [1u8, 2, 3, 4, 5, 6];
    let mut r = CountingReader::new(std::io::Cursor::new(&data));

    let mut b = [0u8; 2];
    r.read_exact(&mut b).unwrap();
    assert_eq!(r.position(), 2);

    r.fill_buf().unwrap();
    r.consume(3);
    assert_eq!(r.position(), 5);

    // reading through a mutable reference keeps counting
    let mut rest = Vec::new();
    (&mut r).read_to_end(&mut rest).unwrap();
    assert_eq!(rest, [6]);
    assert_eq!(r.position(), 6);
}
