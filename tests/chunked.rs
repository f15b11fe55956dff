//! End-to-end tests of chunked frame decoding: the decoded result must be
//! invariant under how the byte stream is partitioned into chunks, and the
//! pipe/connection pair must deliver frames in order under backpressure.

use bytes::Bytes;
use futures::StreamExt;
use wschain::{ByteView, ChunkPipe, Connection, FrameDecoder, OpCode, MAX_PAYLOAD_READ};

/// Encodes one frame per RFC 6455, masking the payload when a key is given.
fn encode_frame(fin: bool, opcode: u8, mask: Option<[u8; 4]>, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.push((u8::from(fin) << 7) | opcode);

    let masked_bit = if mask.is_some() { 0x80 } else { 0x00 };
    match payload.len() {
        n if n < 126 => out.push(masked_bit | n as u8),
        n if n < 65536 => {
            out.push(masked_bit | 126);
            out.extend_from_slice(&(n as u16).to_be_bytes());
        }
        n => {
            out.push(masked_bit | 127);
            out.extend_from_slice(&(n as u64).to_be_bytes());
        }
    }

    match mask {
        Some(key) => {
            out.extend_from_slice(&key);
            out.extend(payload.iter().enumerate().map(|(i, &b)| b ^ key[i % 4]));
        }
        None => out.extend_from_slice(payload),
    }
    out
}

/// Feeds `bytes` to a fresh decoder in the given consecutive chunks and
/// collects every completed frame.
fn decode_chunked(chunks: &[&[u8]]) -> wschain::Result<Vec<wschain::Frame>> {
    let mut decoder = FrameDecoder::new(MAX_PAYLOAD_READ);
    let mut frames = Vec::new();

    for chunk in chunks {
        let mut view = ByteView::from(chunk.to_vec());
        // A chunk may complete several frames; keep advancing until the
        // decoder has taken everything it can from this view.
        loop {
            let progress = decoder.advance(&view)?;
            view = view.slice_from(progress.consumed);
            match progress.frame {
                Some(frame) => frames.push(frame),
                None => break,
            }
        }
        assert!(view.is_empty(), "decoder must drain every chunk");
    }

    Ok(frames)
}

mod chunk_invariance {
    use super::*;

    /// Every partition of a small frame into consecutive non-empty chunks
    /// must decode to the identical frame.
    #[test]
    fn test_all_partitions_of_masked_frame() {
        let bytes = encode_frame(true, 0x1, Some([0x11, 0x22, 0x33, 0x44]), b"abc");
        let reference = decode_chunked(&[&bytes]).unwrap();
        assert_eq!(reference.len(), 1);

        // Each bit of `cuts` decides whether to split after that byte.
        let n = bytes.len();
        for cuts in 0u32..(1 << (n - 1)) {
            let mut chunks: Vec<&[u8]> = Vec::new();
            let mut start = 0;
            for i in 0..n - 1 {
                if cuts & (1 << i) != 0 {
                    chunks.push(&bytes[start..=i]);
                    start = i + 1;
                }
            }
            chunks.push(&bytes[start..]);

            let frames = decode_chunked(&chunks).unwrap();
            assert_eq!(frames, reference, "partition {cuts:#b}");
        }
    }

    /// Coarser sweep for a frame with a 16-bit extended length, including
    /// chunk sizes that split the extended-length field and the payload.
    #[test]
    fn test_chunk_size_sweep_extended_length() {
        let payload: Vec<u8> = (0..300).map(|i| (i % 251) as u8).collect();
        let bytes = encode_frame(true, 0x2, Some([9, 8, 7, 6]), &payload);
        let reference = decode_chunked(&[&bytes]).unwrap();

        for size in [1, 2, 3, 5, 7, 16, 64, 299] {
            let chunks: Vec<&[u8]> = bytes.chunks(size).collect();
            let frames = decode_chunked(&chunks).unwrap();
            assert_eq!(frames, reference, "chunk size {size}");
        }
    }

    #[test]
    fn test_boundary_payload_lengths_survive_rechunking() {
        for len in [0usize, 125, 126, 127, 65535, 65536] {
            let payload = vec![0x5Au8; len];
            let bytes = encode_frame(true, 0x2, None, &payload);

            let whole = decode_chunked(&[&bytes]).unwrap();
            let split: Vec<&[u8]> = bytes.chunks(4096).collect();
            let rechunked = decode_chunked(&split).unwrap();

            assert_eq!(whole, rechunked, "len={len}");
            assert_eq!(whole[0].payload.len(), len);
        }
    }

    #[test]
    fn test_frame_boundary_inside_chunk() {
        // One chunk carrying the tail of frame one and the whole of frame
        // two, then a chunk with a third.
        let mut f1 = encode_frame(true, 0x1, None, b"alpha");
        let f2 = encode_frame(true, 0x1, None, b"beta");
        let f3 = encode_frame(true, 0x1, None, b"gamma");

        let split = f1.len() - 2;
        let mut middle = f1.split_off(split);
        middle.extend_from_slice(&f2);

        let frames = decode_chunked(&[&f1, &middle, &f3]).unwrap();
        let texts: Vec<&str> = frames.iter().map(|f| f.as_str()).collect();
        assert_eq!(texts, ["alpha", "beta", "gamma"]);
    }
}

mod scenario {
    use super::*;

    /// Two text frames delivered in four chunks, the second chunk boundary
    /// landing mid-payload and the final chunk carrying the rest of frame
    /// one plus the entirety of frame two.
    #[tokio::test]
    async fn test_hello_world_hello_again() {
        let first = b"Hello, World";
        let second = b"Hello, again!";

        let mut tail = first[first.len() / 2..].to_vec();
        tail.extend_from_slice(&[0x81, second.len() as u8]);
        tail.extend_from_slice(second);

        let chunks: Vec<Vec<u8>> = vec![
            vec![0x81],
            vec![first.len() as u8],
            first[..first.len() / 2].to_vec(),
            tail,
        ];

        let pipe = ChunkPipe::new();
        let producer = pipe.clone();
        tokio::spawn(async move {
            for chunk in chunks {
                producer.write(chunk).await.unwrap();
                tokio::task::yield_now().await;
            }
            producer.close();
        });

        let mut conn = Connection::new(pipe);

        let frame = conn.next_frame().await.unwrap().expect("first frame");
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.as_str(), "Hello, World");

        let frame = conn.next_frame().await.unwrap().expect("second frame");
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.as_str(), "Hello, again!");

        assert!(conn.next_frame().await.unwrap().is_none());
    }

    /// A frame larger than the pipe's backpressure window still decodes:
    /// the connection acknowledges consumption as it goes, releasing the
    /// producer chunk by chunk.
    #[tokio::test]
    async fn test_frame_larger_than_pipe_capacity() {
        let payload: Vec<u8> = (0..256).map(|i| (i % 256) as u8).collect();
        let bytes = encode_frame(true, 0x2, Some([1, 2, 3, 4]), &payload);

        let pipe = ChunkPipe::with_capacity(16);
        let producer = pipe.clone();
        let expected = payload.clone();
        let writer = tokio::spawn(async move {
            for chunk in bytes.chunks(8) {
                producer.write(chunk.to_vec()).await.unwrap();
            }
            producer.close();
        });

        let mut conn = Connection::new(pipe);
        let frame = conn.next_frame().await.unwrap().expect("large frame");
        assert_eq!(frame.payload, Bytes::from(expected));

        writer.await.unwrap();
        assert!(conn.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stream_of_frames() {
        let pipe = ChunkPipe::new();
        let producer = pipe.clone();
        tokio::spawn(async move {
            for i in 0..5u8 {
                let frame = encode_frame(true, 0x2, None, &[i]);
                producer.write(frame).await.unwrap();
            }
            producer.close();
        });

        let frames: Vec<_> = Connection::new(pipe)
            .into_stream()
            .map(|res| res.expect("decode ok"))
            .collect()
            .await;

        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.payload, Bytes::from(vec![i as u8]));
        }
    }

    #[tokio::test]
    async fn test_truncated_stream_is_distinguished_from_clean_close() {
        // Clean close: stream ends exactly on a frame boundary.
        let pipe = ChunkPipe::new();
        pipe.write(encode_frame(true, 0x1, None, b"done"))
            .await
            .unwrap();
        pipe.close();
        let mut conn = Connection::new(pipe);
        assert!(conn.next_frame().await.unwrap().is_some());
        assert!(conn.next_frame().await.unwrap().is_none());

        // Truncation: stream ends inside a frame.
        let pipe = ChunkPipe::new();
        let bytes = encode_frame(true, 0x1, None, b"interrupted");
        pipe.write(bytes[..6].to_vec()).await.unwrap();
        pipe.close();
        let mut conn = Connection::new(pipe);
        assert!(matches!(
            conn.next_frame().await,
            Err(wschain::Error::ConnectionClosed)
        ));
    }
}
