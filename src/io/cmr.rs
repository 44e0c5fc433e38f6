//! CMR XML metadata for vegetation index granules.
//!
//! The input granule's `HLS.*.cmr.xml` is streamed through quick-xml and
//! rewritten for the `HLS-VI` product: identifiers get the new prefix, times are
//! refreshed from the written index tags, collection fields point at the VI
//! collection, and split-and-merged additional attribute values (`a + b`) are
//! reduced to their first part.
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::granule::{GranuleId, swap_prefix};
use crate::io::gdal::read_tags;
use crate::io::writers::tags::{PROCESSING_TIME_TAG, SENSING_TIME_TAG, format_timestamp};
use crate::types::Instrument;

const CMR_SUFFIX: &str = ".cmr.xml";
const INPUT_GRANULE_UR_ATTR: &str = "Input_HLS_GranuleUR";
const DOI_ATTR: &str = "IDENTIFIER_PRODUCT_DOI";
const SIZE_ELEMENT: &str = "DataGranule/DataGranuleSizeInBytes";
const ATTRIBUTES_ELEMENT: &str = "AdditionalAttributes";

/// Elements (relative to the root) every input document must carry.
const REQUIRED_ELEMENTS: &[&str] = &[
    "GranuleUR",
    "InsertTime",
    "LastUpdate",
    "Collection/DataSetId",
    SIZE_ELEMENT,
    "DataGranule/ProducerGranuleId",
    "DataGranule/ProductionDateTime",
    "Temporal/RangeDateTime/BeginningDateTime",
    "Temporal/RangeDateTime/EndingDateTime",
    ATTRIBUTES_ELEMENT,
    "DataFormat",
];

/// Values injected into the rewritten metadata.
#[derive(Debug, Clone)]
pub struct CmrUpdate {
    pub instrument: Instrument,
    /// Used for `InsertTime` and `LastUpdate`
    pub insert_time: String,
    /// `HLS_VI_PROCESSING_TIME` of the index rasters
    pub production_time: String,
    pub sensing_begin: String,
    pub sensing_end: String,
}

pub fn dataset_id(instrument: Instrument) -> &'static str {
    match instrument {
        Instrument::L30 => "HLS Operational Land Imager Vegetation Indices Daily Global 30 m V2.0",
        Instrument::S30 => {
            "HLS Sentinel-2 Multi-spectral Instrument Vegetation Indices Daily Global 30 m V2.0"
        }
    }
}

pub fn product_doi(instrument: Instrument) -> &'static str {
    match instrument {
        Instrument::L30 => "10.5067/HLS/HLSL30_VI.002",
        Instrument::S30 => "10.5067/HLS/HLSS30_VI.002",
    }
}

/// Earliest and latest timestamps of a `SENSING_TIME` tag.
///
/// The tag holds one or more ISO 8601 timestamps separated by `;` and/or `+`
/// (granules merged upstream); surrounding whitespace and empty parts are ignored.
pub fn parse_sensing_time(sensing_time: &str) -> Result<(String, String)> {
    let mut times: Vec<&str> = sensing_time
        .split(['+', ';'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    times.sort_unstable();
    match (times.first(), times.last()) {
        (Some(first), Some(last)) => Ok((first.to_string(), last.to_string())),
        _ => Err(Error::Metadata(format!(
            "No timestamps in {}: {:?}",
            SENSING_TIME_TAG, sensing_time
        ))),
    }
}

enum Edit {
    Set(String),
    SwapPrefix,
    FirstOfPlus,
    Keep,
}

impl Edit {
    fn apply(&self, text: &str) -> String {
        match self {
            Edit::Set(value) => value.clone(),
            Edit::SwapPrefix => swap_prefix(text),
            Edit::FirstOfPlus => text.split(" + ").next().unwrap_or_default().trim().to_string(),
            Edit::Keep => text.to_string(),
        }
    }
}

fn relative_path(path: &[String]) -> String {
    path.iter().skip(1).map(String::as_str).collect::<Vec<_>>().join("/")
}

/// Text of the first element named `name`, anywhere in the document.
fn element_text(xml: &str, name: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    let mut inside = false;
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == name.as_bytes() => inside = true,
            Event::Text(t) if inside => text.push_str(&t.unescape()?),
            Event::End(e) if inside && e.name().as_ref() == name.as_bytes() => {
                return Ok(Some(text.trim().to_string()));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn write_text_element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_additional_attribute<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &str,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("AdditionalAttribute")))?;
    write_text_element(writer, "Name", name)?;
    writer.write_event(Event::Start(BytesStart::new("Values")))?;
    write_text_element(writer, "Value", value)?;
    writer.write_event(Event::End(BytesEnd::new("Values")))?;
    writer.write_event(Event::End(BytesEnd::new("AdditionalAttribute")))?;
    Ok(())
}

struct Rewriter<'a> {
    update: &'a CmrUpdate,
    /// (attribute name, value, already present in the input)
    attributes: Vec<(&'static str, String, bool)>,
    attr_name: Option<String>,
    first_value: bool,
}

impl Rewriter<'_> {
    fn edit_for(&mut self, rel: &str) -> Option<Edit> {
        let u = self.update;
        let edit = match rel {
            "GranuleUR" | "DataGranule/ProducerGranuleId" => Edit::SwapPrefix,
            "InsertTime" | "LastUpdate" => Edit::Set(u.insert_time.clone()),
            "Collection/DataSetId" => Edit::Set(dataset_id(u.instrument).to_string()),
            "DataGranule/ProductionDateTime" => Edit::Set(u.production_time.clone()),
            "Temporal/RangeDateTime/BeginningDateTime" => Edit::Set(u.sensing_begin.clone()),
            "Temporal/RangeDateTime/EndingDateTime" => Edit::Set(u.sensing_end.clone()),
            "DataFormat" => Edit::Set("COG".to_string()),
            "AdditionalAttributes/AdditionalAttribute/Name" => Edit::Keep,
            "AdditionalAttributes/AdditionalAttribute/Values/Value" => {
                let first = std::mem::replace(&mut self.first_value, false);
                let name = self.attr_name.as_deref();
                match self.attributes.iter_mut().find(|(n, _, _)| Some(*n) == name) {
                    Some((_, value, present)) if first => {
                        *present = true;
                        Edit::Set(value.clone())
                    }
                    _ => Edit::FirstOfPlus,
                }
            }
            _ => return None,
        };
        Some(edit)
    }
}

/// Rewrite an input granule's CMR XML document for the VI product.
pub fn rewrite_cmr(xml: &str, update: &CmrUpdate) -> Result<String> {
    let input_granule_ur = element_text(xml, "GranuleUR")?
        .ok_or_else(|| Error::Metadata("GranuleUR element missing".into()))?;

    let mut rw = Rewriter {
        update,
        attributes: vec![
            (INPUT_GRANULE_UR_ATTR, input_granule_ur, false),
            (DOI_ATTR, product_doi(update.instrument).to_string(), false),
        ],
        attr_name: None,
        first_value: true,
    };

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    let mut path: Vec<String> = Vec::new();
    let mut editing: Option<Edit> = None;
    let mut text = String::new();
    let mut skip_depth: Option<usize> = None;
    let mut touched: HashSet<String> = HashSet::new();

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) => {
                path.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                if skip_depth.is_some() {
                    continue;
                }
                let rel = relative_path(&path);
                if rel == SIZE_ELEMENT {
                    skip_depth = Some(path.len());
                    touched.insert(rel);
                    continue;
                }
                if rel == "AdditionalAttributes/AdditionalAttribute" {
                    rw.attr_name = None;
                    rw.first_value = true;
                }
                editing = rw.edit_for(&rel);
                text.clear();
                writer.write_event(Event::Start(e))?;
            }
            Event::End(e) => {
                let depth = path.len();
                let rel = relative_path(&path);
                path.pop();
                if let Some(d) = skip_depth {
                    if depth == d {
                        skip_depth = None;
                    }
                    continue;
                }
                if let Some(edit) = editing.take() {
                    let new_text = edit.apply(&text);
                    if rel == "AdditionalAttributes/AdditionalAttribute/Name" {
                        rw.attr_name = Some(new_text.clone());
                    }
                    writer.write_event(Event::Text(BytesText::new(&new_text)))?;
                    touched.insert(rel.clone());
                }
                if rel == ATTRIBUTES_ELEMENT {
                    for (name, value, present) in &rw.attributes {
                        if !present {
                            write_additional_attribute(&mut writer, name, value)?;
                        }
                    }
                    touched.insert(rel);
                }
                writer.write_event(Event::End(e))?;
            }
            Event::Empty(e) => {
                if skip_depth.is_some() {
                    continue;
                }
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                path.push(name.clone());
                let rel = relative_path(&path);
                path.pop();
                if rel == SIZE_ELEMENT {
                    touched.insert(rel);
                    continue;
                }
                if rel == ATTRIBUTES_ELEMENT {
                    writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
                    for (attr, value, _) in &rw.attributes {
                        write_additional_attribute(&mut writer, attr, value)?;
                    }
                    writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
                    touched.insert(rel);
                    continue;
                }
                match rw.edit_for(&rel) {
                    Some(edit) => {
                        write_text_element(&mut writer, &name, &edit.apply(""))?;
                        touched.insert(rel);
                    }
                    None => writer.write_event(Event::Empty(e))?,
                }
            }
            Event::Text(t) => {
                if skip_depth.is_some() {
                    continue;
                }
                if editing.is_some() {
                    text.push_str(&t.unescape()?);
                } else {
                    writer.write_event(Event::Text(t))?;
                }
            }
            Event::CData(c) => {
                if skip_depth.is_some() {
                    continue;
                }
                if editing.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                } else {
                    writer.write_event(Event::CData(c))?;
                }
            }
            other => {
                if skip_depth.is_none() {
                    writer.write_event(other)?;
                }
            }
        }
    }

    for required in REQUIRED_ELEMENTS {
        if !touched.contains(*required) {
            return Err(Error::Metadata(format!("{} element missing", required)));
        }
    }

    let out = String::from_utf8(writer.into_inner())
        .map_err(|e| Error::Metadata(format!("rewritten XML is not UTF-8: {}", e)))?;
    if out.trim_start().starts_with("<?xml") {
        Ok(out)
    } else {
        Ok(format!("<?xml version='1.0' encoding='utf-8'?>\n{}", out))
    }
}

fn first_matching(dir: &Path, matches: impl Fn(&str) -> bool) -> Result<Option<PathBuf>> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| Error::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(&matches)
        })
        .collect();
    found.sort();
    Ok(found.into_iter().next())
}

/// Write `HLS-VI.*.cmr.xml` into `output_dir` from the input granule metadata
/// in `input_dir` and the tags of an index raster already in `output_dir`.
pub fn generate_metadata(input_dir: &Path, output_dir: &Path) -> Result<PathBuf> {
    let metadata_path = first_matching(input_dir, |n| n.starts_with("HLS.") && n.ends_with(CMR_SUFFIX))?
        .ok_or_else(|| {
            Error::Metadata(format!("No HLS.*{} file in {:?}", CMR_SUFFIX, input_dir))
        })?;
    let file_name = metadata_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let id: GranuleId = file_name.trim_end_matches(CMR_SUFFIX).parse()?;

    let tif = first_matching(output_dir, |n| n.ends_with(".tif"))?
        .ok_or_else(|| Error::Metadata(format!("No index GeoTIFF in {:?}", output_dir)))?;
    let tags = read_tags(&tif)?;
    let tag = |key: &str| {
        tags.get(key)
            .cloned()
            .ok_or_else(|| Error::Metadata(format!("{} tag missing from {:?}", key, tif)))
    };
    let (sensing_begin, sensing_end) = parse_sensing_time(&tag(SENSING_TIME_TAG)?)?;

    let update = CmrUpdate {
        instrument: id.instrument,
        insert_time: format_timestamp(Utc::now()),
        production_time: tag(PROCESSING_TIME_TAG)?,
        sensing_begin,
        sensing_end,
    };
    debug!("CMR update for {}: {:?}", id, update);

    let xml = fs::read_to_string(&metadata_path).map_err(|e| Error::io(&metadata_path, e))?;
    let rewritten = rewrite_cmr(&xml, &update)?;

    let output_path = output_dir.join(swap_prefix(&file_name));
    fs::write(&output_path, rewritten).map_err(|e| Error::io(&output_path, e))?;
    info!("Wrote CMR metadata {:?}", output_path);
    Ok(output_path)
}
