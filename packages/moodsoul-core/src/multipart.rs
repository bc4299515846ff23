//! Multipart/form-data body planning.
//!
//! The device cannot hold a full request body in memory, and the HTTP header
//! block must carry `Content-Length` before the first body byte. This module
//! therefore produces a [`MultipartPlan`]: an ordered list of literal framing
//! bytes and references to external payload buffers. The plan knows its exact
//! length without ever touching payload bytes; the transport later walks the
//! same list to write the body.
//!
//! Field order is fixed:
//!
//! ```text
//! --B  deviceId            (text)
//! --B  trigger             (text, optional)
//! --B  image  capture.jpg  (payload, optional)
//! --B  audio  audio.pcm    (payload)
//! --B--
//! ```

use std::time::Instant;

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol_constants::{
    AUDIO_CONTENT_TYPE, AUDIO_FILENAME, BOUNDARY_PREFIX, FIELD_AUDIO, FIELD_DEVICE_ID,
    FIELD_IMAGE, FIELD_TRIGGER, IMAGE_CONTENT_TYPE, IMAGE_FILENAME,
};

const CRLF: &[u8] = b"\r\n";

/// Identifies which external buffer a payload segment refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadRef {
    Image,
    Audio,
}

impl PayloadRef {
    /// Multipart field name of the payload.
    #[must_use]
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Image => FIELD_IMAGE,
            Self::Audio => FIELD_AUDIO,
        }
    }
}

/// One piece of the request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Framing bytes owned by the plan (boundaries, part headers, text values).
    Literal(Bytes),
    /// `len` bytes taken from the start of an external buffer.
    Payload { source: PayloadRef, len: usize },
}

impl Segment {
    /// Number of body bytes this segment contributes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Literal(bytes) => bytes.len(),
            Self::Payload { len, .. } => *len,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Inputs needed to plan a body. Only payload lengths are required.
#[derive(Debug, Clone, Copy)]
pub struct PlanFields<'a> {
    pub device_id: &'a str,
    pub trigger: Option<&'a str>,
    pub image_len: Option<usize>,
    pub audio_len: usize,
}

/// Precomputed body layout for one request.
///
/// Invariant: [`content_length`](Self::content_length) equals the sum of all
/// segment lengths, i.e. exactly the number of bytes the transport writes.
#[derive(Debug, Clone)]
pub struct MultipartPlan {
    boundary: String,
    segments: Vec<Segment>,
    content_length: usize,
}

impl MultipartPlan {
    /// The boundary token (without the leading `--`).
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the `Content-Type` request header.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Exact byte length of the body.
    #[must_use]
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    /// Segments in write order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Total bytes of literal framing (everything except payloads).
    #[must_use]
    pub fn literal_overhead(&self) -> usize {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Literal(b) => Some(b.len()),
                Segment::Payload { .. } => None,
            })
            .sum()
    }
}

/// Builds [`MultipartPlan`]s with boundary tokens drawn from a monotonic clock.
///
/// Boundaries only need to be unique within one connection, so the elapsed
/// milliseconds since the encoder was created are sufficient.
#[derive(Debug, Clone)]
pub struct MultipartEncoder {
    epoch: Instant,
}

impl MultipartEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Returns a boundary token for the current clock reading.
    #[must_use]
    pub fn next_boundary(&self) -> String {
        format!("{}{}", BOUNDARY_PREFIX, self.epoch.elapsed().as_millis())
    }

    /// Plans a body using a fresh boundary token.
    #[must_use]
    pub fn plan(&self, fields: &PlanFields<'_>) -> MultipartPlan {
        plan_with_boundary(self.next_boundary(), fields)
    }
}

impl Default for MultipartEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Plans a body with an explicit boundary token.
///
/// Pure computation over sizes and strings; payload bytes are never read.
#[must_use]
pub fn plan_with_boundary(boundary: String, fields: &PlanFields<'_>) -> MultipartPlan {
    let mut builder = PlanBuilder::new(&boundary);

    builder.text_part(FIELD_DEVICE_ID, fields.device_id);
    if let Some(trigger) = fields.trigger.filter(|t| !t.is_empty()) {
        builder.text_part(FIELD_TRIGGER, trigger);
    }
    if let Some(len) = fields.image_len {
        builder.payload_part(PayloadRef::Image, IMAGE_FILENAME, IMAGE_CONTENT_TYPE, len);
    }
    builder.payload_part(
        PayloadRef::Audio,
        AUDIO_FILENAME,
        AUDIO_CONTENT_TYPE,
        fields.audio_len,
    );

    let segments = builder.finish();
    let content_length = segments.iter().map(Segment::len).sum();

    log::debug!(
        "[Multipart] Planned {} segments, {} bytes (boundary={})",
        segments.len(),
        content_length,
        boundary
    );

    MultipartPlan {
        boundary,
        segments,
        content_length,
    }
}

/// Accumulates literal bytes and flushes them whenever a payload is inserted,
/// so adjacent framing collapses into a single segment.
struct PlanBuilder<'a> {
    boundary: &'a str,
    pending: BytesMut,
    segments: Vec<Segment>,
}

impl<'a> PlanBuilder<'a> {
    fn new(boundary: &'a str) -> Self {
        Self {
            boundary,
            pending: BytesMut::with_capacity(256),
            segments: Vec::with_capacity(5),
        }
    }

    fn delimiter(&mut self) {
        self.pending.put_slice(b"--");
        self.pending.put_slice(self.boundary.as_bytes());
        self.pending.put_slice(CRLF);
    }

    fn text_part(&mut self, name: &str, value: &str) {
        self.delimiter();
        self.pending.put_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        self.pending.put_slice(value.as_bytes());
        self.pending.put_slice(CRLF);
    }

    fn payload_part(
        &mut self,
        source: PayloadRef,
        filename: &str,
        content_type: &str,
        len: usize,
    ) {
        self.delimiter();
        self.pending.put_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: {}\r\n\r\n",
                source.field_name(),
                filename,
                content_type
            )
            .as_bytes(),
        );
        self.flush();
        self.segments.push(Segment::Payload { source, len });
        self.pending.put_slice(CRLF);
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.segments
                .push(Segment::Literal(self.pending.split().freeze()));
        }
    }

    fn finish(mut self) -> Vec<Segment> {
        self.pending.put_slice(b"--");
        self.pending.put_slice(self.boundary.as_bytes());
        self.pending.put_slice(b"--\r\n");
        self.flush();
        self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "------------------------1234";

    fn render(plan: &MultipartPlan, image: &[u8], audio: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for segment in plan.segments() {
            match segment {
                Segment::Literal(b) => out.extend_from_slice(b),
                Segment::Payload { source, len } => match source {
                    PayloadRef::Image => out.extend_from_slice(&image[..*len]),
                    PayloadRef::Audio => out.extend_from_slice(&audio[..*len]),
                },
            }
        }
        out
    }

    fn part_names(body: &[u8]) -> Vec<String> {
        let text = String::from_utf8_lossy(body);
        text.match_indices("; name=\"")
            .map(|(i, _)| {
                let rest = &text[i + 8..];
                rest[..rest.find('"').unwrap()].to_string()
            })
            .collect()
    }

    #[test]
    fn manual_touch_plan_matches_rendered_body() {
        let image = vec![0xAB; 500];
        let audio = vec![0x11; 96_000];
        let plan = plan_with_boundary(
            BOUNDARY.to_string(),
            &PlanFields {
                device_id: "A1B2C3D4E5F6",
                trigger: None,
                image_len: Some(image.len()),
                audio_len: audio.len(),
            },
        );

        let body = render(&plan, &image, &audio);
        assert_eq!(plan.content_length(), body.len());
        assert_eq!(plan.content_length(), 500 + 96_000 + plan.literal_overhead());
        assert_eq!(part_names(&body), ["deviceId", "image", "audio"]);
    }

    #[test]
    fn shake_plan_omits_image_part() {
        let plan = plan_with_boundary(
            BOUNDARY.to_string(),
            &PlanFields {
                device_id: "dev",
                trigger: Some("SHAKE_EVENT"),
                image_len: None,
                audio_len: 1024,
            },
        );

        let body = render(&plan, &[], &[0u8; 1024]);
        assert_eq!(part_names(&body), ["deviceId", "trigger", "audio"]);
        assert!(!plan
            .segments()
            .iter()
            .any(|s| matches!(s, Segment::Payload { source: PayloadRef::Image, .. })));
        assert!(body.ends_with(format!("\r\n--{BOUNDARY}--\r\n").as_bytes()));
    }

    #[test]
    fn literals_are_merged_between_payloads() {
        let plan = plan_with_boundary(
            BOUNDARY.to_string(),
            &PlanFields {
                device_id: "dev",
                trigger: Some("AUTO_OBSERVE"),
                image_len: Some(10),
                audio_len: 20,
            },
        );

        let kinds: Vec<bool> = plan
            .segments()
            .iter()
            .map(|s| matches!(s, Segment::Literal(_)))
            .collect();
        assert_eq!(kinds, [true, false, true, false, true]);
    }

    #[test]
    fn text_part_layout_is_exact() {
        let plan = plan_with_boundary(
            "XYZ".to_string(),
            &PlanFields {
                device_id: "dev1",
                trigger: None,
                image_len: None,
                audio_len: 0,
            },
        );
        let body = render(&plan, &[], &[]);
        let expected = "--XYZ\r\n\
             Content-Disposition: form-data; name=\"deviceId\"\r\n\r\n\
             dev1\r\n\
             --XYZ\r\n\
             Content-Disposition: form-data; name=\"audio\"; filename=\"audio.pcm\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             \r\n\
             --XYZ--\r\n";
        assert_eq!(String::from_utf8(body).unwrap(), expected);
    }

    #[test]
    fn empty_trigger_is_treated_as_absent() {
        let fields = PlanFields {
            device_id: "dev",
            trigger: Some(""),
            image_len: None,
            audio_len: 4,
        };
        let body = render(&plan_with_boundary("B".into(), &fields), &[], &[0; 4]);
        assert_eq!(part_names(&body), ["deviceId", "audio"]);
    }

    #[test]
    fn content_length_tracks_payload_lengths() {
        for image_len in [None, Some(0), Some(1), Some(1023), Some(1024), Some(4097)] {
            for audio_len in [0, 1, 1024, 96_000] {
                let plan = plan_with_boundary(
                    BOUNDARY.to_string(),
                    &PlanFields {
                        device_id: "dev",
                        trigger: Some("UPSIDE_DOWN"),
                        image_len,
                        audio_len,
                    },
                );
                let image = vec![1u8; image_len.unwrap_or(0)];
                let audio = vec![2u8; audio_len];
                assert_eq!(
                    render(&plan, &image, &audio).len(),
                    plan.content_length(),
                    "image={image_len:?} audio={audio_len}"
                );
            }
        }
    }

    #[test]
    fn encoder_boundary_uses_prefix_and_content_type() {
        let encoder = MultipartEncoder::new();
        let plan = encoder.plan(&PlanFields {
            device_id: "dev",
            trigger: None,
            image_len: None,
            audio_len: 8,
        });
        assert!(plan.boundary().starts_with(BOUNDARY_PREFIX));
        assert!(plan.boundary()[BOUNDARY_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_digit()));
        assert_eq!(
            plan.content_type(),
            format!("multipart/form-data; boundary={}", plan.boundary())
        );
    }
}
