//! Wire-Format fuer TCP-Verbindungen
//!
//! Frame-basiertes Protokoll: Length(u32 big-endian) + JSON-Payload.
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE)                   | Payload    |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Die Laenge zaehlt nur die Payload-Bytes. Maximale Frame-Groesse ist
//! konfigurierbar (Standard: 1 MB).
//!
//! Ein zu grosser Frame ist ein Fehler des Streams, danach ist die
//! Verbindung nicht mehr lesbar. Eine vollstaendig gelesene, aber
//! unbrauchbare Payload liefert der Server-Codec dagegen als
//! [`Anfrage::Ungueltig`], der Stream bleibt intakt.

use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::marker::PhantomData;
use tokio_util::codec::{Decoder, Encoder};

use crate::events::{ClientEvent, ServerEvent};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer frame-basierte TCP-Verbindungen
///
/// `D` ist der Typ der dekodierten (eingehenden) Frames. Kodiert wird jeder
/// serialisierbare Typ.
#[derive(Debug)]
pub struct FrameCodec<D> {
    max_frame_size: usize,
    _eingang: PhantomData<fn() -> D>,
}

/// Serverseitiger Codec: liest [`Anfrage`], schreibt [`ServerEvent`]
pub type ServerCodec = FrameCodec<Anfrage>;

/// Clientseitiger Codec: liest [`ServerEvent`], schreibt [`ClientEvent`]
pub type ClientCodec = FrameCodec<ServerEvent>;

impl<D> FrameCodec<D> {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            _eingang: PhantomData,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl<D> Default for FrameCodec<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> Clone for FrameCodec<D> {
    fn clone(&self) -> Self {
        Self::with_max_size(self.max_frame_size)
    }
}

fn ungueltig(nachricht: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, nachricht)
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Typen, die aus der Payload eines vollstaendigen Frames entstehen
pub trait FrameInhalt: Sized {
    fn aus_payload(payload: &[u8]) -> io::Result<Self>;
}

fn json_payload<T: DeserializeOwned>(payload: &[u8]) -> io::Result<T> {
    serde_json::from_slice(payload)
        .map_err(|e| ungueltig(format!("JSON-Deserialisierung fehlgeschlagen: {}", e)))
}

impl FrameInhalt for ClientEvent {
    fn aus_payload(payload: &[u8]) -> io::Result<Self> {
        json_payload(payload)
    }
}

impl FrameInhalt for ServerEvent {
    fn aus_payload(payload: &[u8]) -> io::Result<Self> {
        json_payload(payload)
    }
}

/// Eingehender Frame auf der Serverseite
#[derive(Debug, Clone, PartialEq)]
pub enum Anfrage {
    Ereignis(ClientEvent),
    /// Kein gueltiges Ereignis: kein JSON, unbekannter `type` oder
    /// fehlende bzw. falsch typisierte Felder
    Ungueltig(String),
}

impl FrameInhalt for Anfrage {
    fn aus_payload(payload: &[u8]) -> io::Result<Self> {
        Ok(match serde_json::from_slice(payload) {
            Ok(ereignis) => Self::Ereignis(ereignis),
            Err(e) => Self::Ungueltig(e.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl<D: FrameInhalt> Decoder for FrameCodec<D> {
    type Item = D;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        // Laenge lesen ohne den Buffer zu veraendern
        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        if length > self.max_frame_size {
            return Err(ungueltig(format!(
                "Frame zu gross: {} Bytes (Maximum: {} Bytes)",
                length, self.max_frame_size
            )));
        }

        let total_size = LENGTH_FIELD_SIZE + length;
        if src.len() < total_size {
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_FIELD_SIZE);
        let payload = src.split_to(length);

        D::aus_payload(&payload).map(Some)
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl<D, E: Serialize> Encoder<E> for FrameCodec<D> {
    type Error = io::Error;

    fn encode(&mut self, item: E, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item)
            .map_err(|e| ungueltig(format!("JSON-Serialisierung fehlgeschlagen: {}", e)))?;

        if json.len() > self.max_frame_size {
            return Err(ungueltig(format!(
                "Nachricht zu gross: {} Bytes (Maximum: {} Bytes)",
                json.len(),
                self.max_frame_size
            )));
        }

        dst.reserve(LENGTH_FIELD_SIZE + json.len());
        dst.put_u32(json.len() as u32);
        dst.put_slice(&json);
        Ok(())
    }
}
