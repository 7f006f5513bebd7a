//! Integration tests for midi-ci-property.
//!
//! Messages produced by the sending side are parsed back from their wire bytes and
//! fed into the receiving side, the way a device sitting on a MIDI transport would.

use std::io::Cursor;
use std::thread;

use midi_ci_core::{
    encodings, parse_property_exchange, sub_id, Encoding, Muid, OwningResult,
    PropertyExchangeError, PropertyReplyHeader, PropertyRequestHeader,
};
use midi_ci_property::{
    encode_body, send_property_data, ChannelOutput, InitiatorPropertyExchangeCache,
    OutgoingMessage, PropertyDataMessageChunker, PropertyExchangeCache, PropertyExchangeConfig,
    RequestId, ResponderPropertyExchangeCache,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn seven_bit_body(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(0..0x80u8)).collect()
}

fn reassemble(messages: &[Vec<u8>]) -> Option<OwningResult> {
    let mut cache = PropertyExchangeCache::new();
    let mut result = None;
    for bytes in messages {
        let (_, chunk) = parse_property_exchange(bytes).unwrap();
        result = cache.add_chunk(&chunk);
    }
    result
}

// ---------------------------------------------------------------------------
// 1. Chunker -> cache round trip
// ---------------------------------------------------------------------------

#[test]
fn test_reassembly_of_500_byte_body() {
    init_tracing();

    let header = br#"{"status":200,"mutualEncoding":"ASCII"}"#;
    let body = seven_bit_body(500, 7);

    let mut storage = Vec::new();
    let mut chunker = PropertyDataMessageChunker::new(
        &mut storage,
        64,
        sub_id::GET_DATA_REPLY,
        1,
        header.as_slice(),
        Muid::make_unchecked(0x100),
        Muid::make_unchecked(0x200),
        Cursor::new(body.as_slice()),
    )
    .unwrap();

    let total = chunker.total_num_chunks();
    let mut messages = Vec::new();
    while let Some(chunk) = chunker.current() {
        assert!(chunk.len() <= 64);
        messages.push(chunk.to_vec());
        chunker.advance().unwrap();
    }

    assert!(messages.len() > 1);
    assert_eq!(messages.len(), total as usize);

    let result = reassemble(&messages).unwrap();
    assert!(result.error().is_none());
    assert_eq!(
        result.header().unwrap(),
        &serde_json::from_slice::<serde_json::Value>(header).unwrap()
    );
    assert_eq!(result.body(), body.as_slice());
}

#[test]
fn test_round_trip_every_encoding() {
    init_tracing();

    let config = PropertyExchangeConfig::default().with_max_sysex_size(128);
    let body: Vec<u8> = (0..1500u32).map(|i| (i * 7 % 256) as u8).collect();

    for encoding in Encoding::ALL {
        let Ok(encoded) = encode_body(&body, encoding) else {
            assert_eq!(encoding, Encoding::Ascii);
            continue;
        };

        let reply = PropertyReplyHeader {
            mutual_encoding: encoding,
            ..Default::default()
        };
        let header = encodings::json_to_7bit_text(&reply.to_value_condensed());

        let mut output: Vec<OutgoingMessage> = Vec::new();
        send_property_data(
            &mut output,
            &config,
            0,
            sub_id::GET_DATA_REPLY,
            Muid::make_unchecked(1),
            Muid::make_unchecked(2),
            RequestId::new(0).unwrap(),
            &header,
            &encoded,
        )
        .unwrap();

        let messages: Vec<Vec<u8>> = output.into_iter().map(|m| m.bytes).collect();
        let result = reassemble(&messages).unwrap();
        assert_eq!(result.body(), body.as_slice(), "{encoding}");
        assert_eq!(
            result.result().header_as_reply_header().mutual_encoding,
            encoding
        );
    }
}

#[test]
fn test_dropped_chunk_aborts_transaction() {
    let header = br#"{"status":200}"#;
    let body = seven_bit_body(300, 11);
    let config = PropertyExchangeConfig::default().with_max_sysex_size(128);

    let mut output: Vec<OutgoingMessage> = Vec::new();
    let sent = send_property_data(
        &mut output,
        &config,
        0,
        sub_id::GET_DATA_REPLY,
        Muid::make_unchecked(1),
        Muid::make_unchecked(2),
        RequestId::new(0).unwrap(),
        header,
        &body,
    )
    .unwrap();
    assert!(sent >= 3);

    let mut messages: Vec<Vec<u8>> = output.into_iter().map(|m| m.bytes).collect();
    messages.remove(1);

    let mut cache = PropertyExchangeCache::new();
    let (_, first) = parse_property_exchange(&messages[0]).unwrap();
    assert!(cache.add_chunk(&first).is_none());
    let (_, third) = parse_property_exchange(&messages[1]).unwrap();
    let result = cache.add_chunk(&third).unwrap();
    assert_eq!(result.error(), Some(PropertyExchangeError::OutOfOrderChunk));
}

// ---------------------------------------------------------------------------
// 2. Initiator and responder talking over channels
// ---------------------------------------------------------------------------

#[test]
fn test_get_data_over_channel() {
    init_tracing();

    let config = PropertyExchangeConfig::default()
        .with_max_sysex_size(128)
        .with_max_simultaneous_requests(4);
    let initiator_muid = Muid::make_unchecked(0x0a0b0c);
    let responder_muid = Muid::make_unchecked(0x010203);

    let (to_responder, responder_rx) = ChannelOutput::unbounded();
    let (to_initiator, initiator_rx) = ChannelOutput::unbounded();

    // Responder thread: reassemble the inquiry, reply with a large body
    let responder = thread::spawn(move || {
        let mut output = to_initiator;
        let mut table = ResponderPropertyExchangeCache::new();
        let (done_tx, done_rx) = crossbeam_channel::unbounded();

        for message in responder_rx.iter() {
            let (header, chunk) = parse_property_exchange(&message.bytes).unwrap();
            let request_id = RequestId::new(chunk.request_id).unwrap();

            if chunk.this_chunk_num <= 1 {
                let done_tx = done_tx.clone();
                table.prime_cache(
                    config.max_simultaneous_requests as usize,
                    move |result| {
                        let _ = done_tx.send(result);
                    },
                    request_id,
                );
            }
            table.add_chunk(request_id, &chunk);

            let Ok(inquiry) = done_rx.try_recv() else {
                continue;
            };
            let request = inquiry.result().header_as_request_header();
            assert_eq!(request.resource, "ResourceList");

            let body = seven_bit_body(1000, 3);
            let reply =
                encodings::json_to_7bit_text(&PropertyReplyHeader::default().to_value_condensed());
            send_property_data(
                &mut output,
                &config,
                message.group,
                sub_id::GET_DATA_REPLY,
                responder_muid,
                header.source,
                request_id,
                &reply,
                &body,
            )
            .unwrap();
            return body;
        }
        Vec::new()
    });

    let mut table = InitiatorPropertyExchangeCache::new();
    let (done_tx, done_rx) = crossbeam_channel::unbounded();
    let token = table
        .prime_cache(config.max_simultaneous_requests as usize, move |result| {
            let _ = done_tx.send(result);
        })
        .unwrap();
    let request_id = table.request_id_for_token(token).unwrap();

    let request = encodings::json_to_7bit_text(
        &PropertyRequestHeader::new("ResourceList").to_value_condensed(),
    );
    let mut output = to_responder;
    send_property_data(
        &mut output,
        &config,
        0,
        sub_id::GET_DATA_INQUIRY,
        initiator_muid,
        responder_muid,
        request_id,
        &request,
        &[],
    )
    .unwrap();
    drop(output);

    for message in initiator_rx.iter() {
        let (header, chunk) = parse_property_exchange(&message.bytes).unwrap();
        assert_eq!(header.destination, initiator_muid);
        table.add_chunk(RequestId::new(chunk.request_id).unwrap(), &chunk);
    }

    let expected = responder.join().unwrap();
    let result = done_rx.try_recv().unwrap();
    assert!(result.error().is_none());
    assert_eq!(result.result().header_as_reply_header().status, 200);
    assert_eq!(result.body(), expected.as_slice());
    assert!(table.ongoing_transactions().is_empty());
}

#[test]
fn test_busy_responder() {
    let config = PropertyExchangeConfig::default().with_max_sysex_size(128);
    let mut responder = ResponderPropertyExchangeCache::new();
    let (done_tx, done_rx) = crossbeam_channel::unbounded();

    for id in 0..2 {
        let done_tx = done_tx.clone();
        responder.prime_cache(
            config.max_simultaneous_requests as usize,
            move |result| {
                let _ = done_tx.send((id, result));
            },
            RequestId::new(id).unwrap(),
        );
    }

    let (id, rejected) = done_rx.try_recv().unwrap();
    assert_eq!(id, 1);
    assert_eq!(
        rejected.error(),
        Some(PropertyExchangeError::TooManyTransactions)
    );

    // The initiator receives a 343 reply and reports it the same way
    let mut initiator = InitiatorPropertyExchangeCache::new();
    let (tx, rx) = crossbeam_channel::unbounded();
    let token = initiator
        .prime_cache(1, move |result| {
            let _ = tx.send(result);
        })
        .unwrap();
    let request_id = initiator.request_id_for_token(token).unwrap();

    let reply = encodings::json_to_7bit_text(
        &PropertyReplyHeader::with_status(343).to_value_condensed(),
    );
    let mut output: Vec<OutgoingMessage> = Vec::new();
    send_property_data(
        &mut output,
        &config,
        0,
        sub_id::GET_DATA_REPLY,
        Muid::make_unchecked(1),
        Muid::make_unchecked(2),
        request_id,
        &reply,
        &[],
    )
    .unwrap();

    let (_, chunk) = parse_property_exchange(&output[0].bytes).unwrap();
    initiator.add_chunk(request_id, &chunk);
    assert_eq!(
        rx.try_recv().unwrap().error(),
        Some(PropertyExchangeError::TooManyTransactions)
    );
}
