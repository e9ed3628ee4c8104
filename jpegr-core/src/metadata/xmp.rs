//! hdrgm XMP serialization and parsing.
//!
//! Two packets are produced per file: the base image carries a container
//! directory that references the gain map by MPF item, and the gain map
//! image carries the full metadata record. Content boosts and HDR
//! capacities travel in log2 space.

use crate::limits;
use crate::metadata::VERSION;
use crate::types::{Error, GainMapMetadata, Result};

/// Adobe HDR gain map namespace.
pub const HDRGM_NAMESPACE: &str = "http://ns.adobe.com/hdr-gain-map/1.0/";

/// Container directory namespace.
pub const CONTAINER_NAMESPACE: &str = "http://ns.google.com/photos/1.0/container/";

/// Container item namespace.
pub const ITEM_NAMESPACE: &str = "http://ns.google.com/photos/1.0/container/item/";

/// XMP packet for the gain map image, transporting the metadata record.
pub fn generate_gainmap_xmp(metadata: &GainMapMetadata) -> String {
    format!(
        r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
        xmlns:hdrgm="{HDRGM_NAMESPACE}"
        hdrgm:Version="{VERSION}"
        hdrgm:BaseRenditionIsHDR="False"
        hdrgm:GainMapMin="{:.6}"
        hdrgm:GainMapMax="{:.6}"
        hdrgm:Gamma="{:.6}"
        hdrgm:OffsetSDR="{:.6}"
        hdrgm:OffsetHDR="{:.6}"
        hdrgm:HDRCapacityMin="{:.6}"
        hdrgm:HDRCapacityMax="{:.6}"/>
  </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#,
        metadata.min_content_boost.log2(),
        metadata.max_content_boost.log2(),
        metadata.gamma,
        metadata.offset_sdr,
        metadata.offset_hdr,
        metadata.hdr_capacity_min.log2(),
        metadata.hdr_capacity_max.log2(),
    )
}

/// XMP packet for the base image: the container directory referencing the
/// gain map item and its byte length.
pub fn generate_base_xmp(gainmap_length: usize) -> String {
    format!(
        r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
        xmlns:hdrgm="{HDRGM_NAMESPACE}"
        xmlns:Container="{CONTAINER_NAMESPACE}"
        xmlns:Item="{ITEM_NAMESPACE}"
        hdrgm:Version="{VERSION}">
      <Container:Directory>
        <rdf:Seq>
          <rdf:li rdf:parseType="Resource">
            <Container:Item
                Item:Semantic="Primary"
                Item:Mime="image/jpeg"/>
          </rdf:li>
          <rdf:li rdf:parseType="Resource">
            <Container:Item
                Item:Semantic="GainMap"
                Item:Mime="image/jpeg"
                Item:Length="{gainmap_length}"/>
          </rdf:li>
        </rdf:Seq>
      </Container:Directory>
    </rdf:Description>
  </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#
    )
}

/// Recover the metadata record from a gain map XMP packet.
///
/// Accepts scalar or 3-element values (multi-channel writers), ignores
/// unknown keys, and falls back to format defaults for absent ones.
pub fn parse_gainmap_xmp(xmp: &str) -> Result<GainMapMetadata> {
    if xmp.len() > limits::MAX_XMP_LENGTH {
        return Err(Error::InvalidParam(format!(
            "xmp packet of {} bytes exceeds the parser limit",
            xmp.len()
        )));
    }
    if !xmp.contains("hdrgm:Version") && !xmp.contains("hdrgm:GainMapMax") {
        return Err(Error::UnknownError(
            "no hdrgm metadata found in xmp packet".into(),
        ));
    }

    let mut metadata = GainMapMetadata::default();

    if let Some(v) = attribute_value(xmp, "hdrgm:GainMapMin").and_then(first_value) {
        metadata.min_content_boost = 2.0f32.powf(v);
    }
    if let Some(v) = attribute_value(xmp, "hdrgm:GainMapMax").and_then(first_value) {
        metadata.max_content_boost = 2.0f32.powf(v);
    }
    if let Some(v) = attribute_value(xmp, "hdrgm:Gamma").and_then(first_value) {
        metadata.gamma = v;
    }
    if let Some(v) = attribute_value(xmp, "hdrgm:OffsetSDR").and_then(first_value) {
        metadata.offset_sdr = v;
    }
    if let Some(v) = attribute_value(xmp, "hdrgm:OffsetHDR").and_then(first_value) {
        metadata.offset_hdr = v;
    }
    if let Some(v) = attribute_value(xmp, "hdrgm:HDRCapacityMin").and_then(first_value) {
        metadata.hdr_capacity_min = 2.0f32.powf(v);
    }
    if let Some(v) = attribute_value(xmp, "hdrgm:HDRCapacityMax").and_then(first_value) {
        metadata.hdr_capacity_max = 2.0f32.powf(v);
    }

    Ok(metadata)
}

/// The gain map item length recorded in a base image XMP packet.
pub fn parse_gainmap_length(xmp: &str) -> Option<usize> {
    attribute_value(xmp, "Item:Length")?.trim().parse().ok()
}

/// Extract an attribute value, accepting `attr="v"` and `<attr>v</attr>`.
fn attribute_value(xmp: &str, name: &str) -> Option<String> {
    let pattern = format!("{name}=\"");
    if let Some(start) = xmp.find(&pattern) {
        let rest = &xmp[start + pattern.len()..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }

    let open = format!("<{name}>");
    let close = format!("</{name}>");
    if let Some(start) = xmp.find(&open) {
        let rest = &xmp[start + open.len()..];
        if let Some(end) = rest.find(&close) {
            return Some(rest[..end].trim().to_string());
        }
    }

    None
}

/// First numeric element of a scalar or comma-separated value.
fn first_value(value: String) -> Option<f32> {
    value
        .split(',')
        .filter_map(|s| s.trim().parse::<f32>().ok())
        .next()
}
