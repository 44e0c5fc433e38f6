//! STAC items for vegetation index granules.
//!
//! Built from an `HLS-VI.*.cmr.xml` document (identifier, sensing range,
//! footprint polygons, platform and additional attributes) plus the grid of the
//! granule's NDVI raster, which supplies the projection transform and shape.
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, SecondsFormat, TimeZone, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::grid::GridGeometry;
use crate::error::{Error, Result};
use crate::io::gdal::read_geometry;
use crate::types::{Instrument, VegetationIndex};

pub const DEFAULT_ENDPOINT: &str = "data.lpdaac.earthdatacloud.nasa.gov";
pub const DEFAULT_VERSION: &str = "020";

const STAC_VERSION: &str = "1.0.0";
const STAC_EXTENSIONS: [&str; 4] = [
    "https://stac-extensions.github.io/eo/v1.0.0/schema.json",
    "https://stac-extensions.github.io/projection/v1.0.0/schema.json",
    "https://stac-extensions.github.io/view/v1.0.0/schema.json",
    "https://stac-extensions.github.io/scientific/v1.0.0/schema.json",
];
const COG_MEDIA_TYPE: &str = "image/tiff; application=geotiff; profile=cloud-optimized";
const JPEG_MEDIA_TYPE: &str = "image/jpeg";
const CMR_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

const POLYGON: &str = "Spatial/HorizontalSpatialDomain/Geometry/GPolygon";
const POINT: &str = "Spatial/HorizontalSpatialDomain/Geometry/GPolygon/Boundary/Point";

/// Where the published granule files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StacOptions {
    /// Host of the distribution endpoint
    pub endpoint: String,
    /// Collection version in the bucket path (`HLSL30.020`)
    pub version: String,
}

impl Default for StacOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            version: DEFAULT_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StacItem {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub stac_version: &'static str,
    pub stac_extensions: Vec<&'static str>,
    pub id: String,
    pub geometry: MultiPolygon,
    pub bbox: [f64; 4],
    pub properties: ItemProperties,
    pub links: Vec<Link>,
    pub assets: BTreeMap<String, Asset>,
}

/// GeoJSON `MultiPolygon` of `[longitude, latitude]` positions.
#[derive(Debug, Clone, Serialize)]
pub struct MultiPolygon {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub coordinates: Vec<Vec<Vec<[f64; 2]>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemProperties {
    pub datetime: String,
    pub start_datetime: String,
    pub end_datetime: String,
    pub platform: String,
    pub instruments: Vec<String>,
    #[serde(rename = "eo:cloud_cover", skip_serializing_if = "Option::is_none")]
    pub cloud_cover: Option<f64>,
    #[serde(rename = "proj:epsg", skip_serializing_if = "Option::is_none")]
    pub epsg: Option<u32>,
    /// Affine coefficients `[a, b, c, d, e, f, 0, 0, 1]`
    #[serde(rename = "proj:transform")]
    pub transform: [f64; 9],
    /// `[rows, cols]`
    #[serde(rename = "proj:shape")]
    pub shape: [usize; 2],
    #[serde(rename = "view:sun_azimuth", skip_serializing_if = "Option::is_none")]
    pub sun_azimuth: Option<f64>,
    #[serde(rename = "view:azimuth", skip_serializing_if = "Option::is_none")]
    pub view_azimuth: Option<f64>,
    #[serde(rename = "sci:doi", skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub rel: &'static str,
    pub href: String,
    #[serde(rename = "type")]
    pub media_type: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Asset {
    pub href: String,
    #[serde(rename = "type")]
    pub media_type: &'static str,
    pub roles: Vec<&'static str>,
    #[serde(rename = "eo:bands", skip_serializing_if = "Vec::is_empty")]
    pub bands: Vec<EoBand>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EoBand {
    pub name: &'static str,
    pub common_name: &'static str,
}

/// Fields of a CMR granule document the item is built from.
#[derive(Debug, Default)]
struct CmrGranule {
    granule_ur: Option<String>,
    begin: Option<String>,
    end: Option<String>,
    platform: Option<String>,
    instrument: Option<String>,
    polygons: Vec<Vec<[f64; 2]>>,
    /// Attribute name to its first value
    attributes: HashMap<String, String>,
}

fn parse_f64(what: &str, text: &str) -> Result<f64> {
    text.trim()
        .parse()
        .map_err(|_| Error::Metadata(format!("{} is not a number: {:?}", what, text)))
}

impl CmrGranule {
    fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut granule = CmrGranule::default();
        let mut path: Vec<String> = Vec::new();
        let mut text = String::new();
        let mut attr_name: Option<String> = None;
        let mut lon: Option<f64> = None;
        let mut lat: Option<f64> = None;

        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::Start(e) => {
                    path.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                    text.clear();
                    match relative(&path).as_str() {
                        POLYGON => granule.polygons.push(Vec::new()),
                        POINT => {
                            lon = None;
                            lat = None;
                        }
                        "AdditionalAttributes/AdditionalAttribute" => attr_name = None,
                        _ => {}
                    }
                }
                Event::Text(t) => text.push_str(&t.unescape()?),
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
                Event::End(_) => {
                    let rel = relative(&path);
                    path.pop();
                    let value = text.trim().to_string();
                    text.clear();
                    granule.take(&rel, value, &mut attr_name, &mut lon, &mut lat)?;
                }
                _ => {}
            }
        }
        Ok(granule)
    }

    fn take(
        &mut self,
        rel: &str,
        value: String,
        attr_name: &mut Option<String>,
        lon: &mut Option<f64>,
        lat: &mut Option<f64>,
    ) -> Result<()> {
        match rel {
            "GranuleUR" => self.granule_ur = Some(value),
            "Temporal/RangeDateTime/BeginningDateTime" => self.begin = Some(value),
            "Temporal/RangeDateTime/EndingDateTime" => self.end = Some(value),
            "Platforms/Platform/ShortName" => {
                self.platform.get_or_insert(value);
            }
            "Platforms/Platform/Instruments/Instrument/ShortName" => {
                self.instrument.get_or_insert(value);
            }
            "AdditionalAttributes/AdditionalAttribute/Name" => *attr_name = Some(value),
            "AdditionalAttributes/AdditionalAttribute/Values/Value" => {
                if let Some(name) = attr_name.as_ref() {
                    self.attributes.entry(name.clone()).or_insert(value);
                }
            }
            _ if rel == format!("{}/PointLongitude", POINT) => {
                *lon = Some(parse_f64("PointLongitude", &value)?);
            }
            _ if rel == format!("{}/PointLatitude", POINT) => {
                *lat = Some(parse_f64("PointLatitude", &value)?);
            }
            POINT => match (lon.take(), lat.take(), self.polygons.last_mut()) {
                (Some(x), Some(y), Some(ring)) => ring.push([x, y]),
                _ => {
                    return Err(Error::Metadata(
                        "GPolygon point without longitude and latitude".into(),
                    ));
                }
            },
            _ => {}
        }
        Ok(())
    }

    fn attribute_f64(&self, name: &str) -> Result<Option<f64>> {
        self.attributes
            .get(name)
            .map(|v| parse_f64(name, v))
            .transpose()
    }
}

fn relative(path: &[String]) -> String {
    path.iter().skip(1).map(String::as_str).collect::<Vec<_>>().join("/")
}

fn required(field: Option<String>, element: &str) -> Result<String> {
    field.ok_or_else(|| Error::Metadata(format!("{} element missing", element)))
}

/// CMR timestamp (`2024-04-29T21:11:59.722175Z`) as an RFC 3339 UTC string.
fn stac_datetime(cmr_time: &str) -> Result<String> {
    let naive = NaiveDateTime::parse_from_str(cmr_time, CMR_TIME_FORMAT)
        .map_err(|e| Error::Metadata(format!("Bad CMR timestamp {:?}: {}", cmr_time, e)))?;
    Ok(Utc
        .from_utc_datetime(&naive)
        .to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Lowercased instrument short name; `Sentinel-2A MSI` becomes `msi`.
fn instrument_name(short_name: &str) -> String {
    let lower = short_name.to_lowercase();
    match lower.split_whitespace().nth(1) {
        Some(second) => second.to_string(),
        None => lower,
    }
}

/// UTM north EPSG code of an MGRS tile (`06WVS` or `T06WVS` gives 32606).
fn utm_epsg(tile: &str) -> Result<u32> {
    let tile = tile.trim().trim_start_matches('T');
    tile.get(0..2)
        .and_then(|zone| format!("326{}", zone).parse().ok())
        .ok_or_else(|| Error::Metadata(format!("Unparseable MGRS_TILE_ID: {:?}", tile)))
}

/// Closed rings, one per footprint polygon, and their bounding box.
fn footprint(polygons: Vec<Vec<[f64; 2]>>) -> Result<(MultiPolygon, [f64; 4])> {
    if polygons.is_empty() || polygons.iter().any(Vec::is_empty) {
        return Err(Error::Metadata("GPolygon footprint missing or empty".into()));
    }
    let mut bbox = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
    let mut coordinates = Vec::with_capacity(polygons.len());
    for mut ring in polygons {
        for &[x, y] in &ring {
            bbox = [bbox[0].min(x), bbox[1].min(y), bbox[2].max(x), bbox[3].max(y)];
        }
        let first = ring[0];
        ring.push(first);
        coordinates.push(vec![ring]);
    }
    Ok((
        MultiPolygon {
            kind: "MultiPolygon",
            coordinates,
        },
        bbox,
    ))
}

/// Affine coefficients of a GDAL geotransform, rasterio style.
fn affine(gt: &[f64; 6]) -> [f64; 9] {
    [gt[1], gt[2], gt[0], gt[4], gt[5], gt[3], 0.0, 0.0, 1.0]
}

fn assets(
    item_id: &str,
    instrument: Instrument,
    options: &StacOptions,
) -> (BTreeMap<String, Asset>, String) {
    let collection = format!("HLS{}.{}", instrument, options.version);
    let protected = format!(
        "https://{}/lp-prod-protected/{}/{}/",
        options.endpoint, collection, item_id
    );
    let public = format!(
        "https://{}/lp-prod-public/{}/{}/",
        options.endpoint, collection, item_id
    );

    let mut assets: BTreeMap<String, Asset> = VegetationIndex::ALL
        .iter()
        .map(|index| {
            let name = index.name();
            let asset = Asset {
                href: format!("{}{}.{}.tif", protected, item_id, name),
                media_type: COG_MEDIA_TYPE,
                roles: vec!["data"],
                bands: vec![EoBand {
                    name,
                    common_name: name,
                }],
            };
            (name.to_string(), asset)
        })
        .collect();
    assets.insert(
        "thumbnail".to_string(),
        Asset {
            href: format!("{}{}.jpg", public, item_id),
            media_type: JPEG_MEDIA_TYPE,
            roles: vec!["thumbnail"],
            bands: Vec::new(),
        },
    );
    (assets, format!("{}{}_stac.json", public, item_id))
}

/// Build the STAC item of a VI granule from its CMR XML and NDVI grid.
pub fn cmr_to_item(xml: &str, grid: &GridGeometry, options: &StacOptions) -> Result<StacItem> {
    let granule = CmrGranule::parse(xml)?;

    let cloud_cover = granule.attribute_f64("CLOUD_COVERAGE")?;
    let sun_azimuth = granule.attribute_f64("MEAN_SUN_AZIMUTH_ANGLE")?;
    let view_azimuth = granule.attribute_f64("MEAN_VIEW_AZIMUTH_ANGLE")?;
    let epsg = granule
        .attributes
        .get("MGRS_TILE_ID")
        .map(String::as_str)
        .map(utm_epsg)
        .transpose()?;
    let doi = granule.attributes.get("IDENTIFIER_PRODUCT_DOI").cloned();

    let id = required(granule.granule_ur, "GranuleUR")?;
    let instrument = id
        .split('.')
        .nth(1)
        .and_then(Instrument::from_name)
        .ok_or_else(|| Error::InvalidGranuleId(id.clone()))?;
    let start = stac_datetime(&required(granule.begin, "BeginningDateTime")?)?;
    let end = stac_datetime(&required(granule.end, "EndingDateTime")?)?;
    let platform = required(granule.platform, "Platform/ShortName")?.to_lowercase();
    let sensor = instrument_name(&required(granule.instrument, "Instrument/ShortName")?);
    let (geometry, bbox) = footprint(granule.polygons)?;
    let (assets, self_href) = assets(&id, instrument, options);

    debug!("STAC item {} with {} assets", id, assets.len());
    Ok(StacItem {
        kind: "Feature",
        stac_version: STAC_VERSION,
        stac_extensions: STAC_EXTENSIONS.to_vec(),
        geometry,
        bbox,
        properties: ItemProperties {
            datetime: start.clone(),
            start_datetime: start,
            end_datetime: end,
            platform,
            instruments: vec![sensor],
            cloud_cover,
            epsg,
            transform: affine(&grid.geotransform),
            shape: [grid.height, grid.width],
            sun_azimuth,
            view_azimuth,
            doi,
        },
        links: vec![Link {
            rel: "self",
            href: self_href,
            media_type: "application/json",
        }],
        assets,
        id,
    })
}

/// NDVI raster sitting next to a `*.cmr.xml` file.
pub fn ndvi_path_for(cmr_xml: &Path) -> PathBuf {
    let name = cmr_xml
        .file_name()
        .map(|n| n.to_string_lossy().replace("cmr.xml", "NDVI.tif"))
        .unwrap_or_default();
    cmr_xml.with_file_name(name)
}

/// Write the STAC item JSON of the granule described by `cmr_xml` to `out_json`.
pub fn generate_stac_item(cmr_xml: &Path, out_json: &Path, options: &StacOptions) -> Result<StacItem> {
    let xml = fs::read_to_string(cmr_xml).map_err(|e| Error::io(cmr_xml, e))?;
    let grid = read_geometry(ndvi_path_for(cmr_xml))?;
    let item = cmr_to_item(&xml, &grid, options)?;

    let json = serde_json::to_string_pretty(&item)?;
    fs::write(out_json, json).map_err(|e| Error::io(out_json, e))?;
    info!("Wrote STAC item {:?}", out_json);
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SAMPLE: &str = r#"<?xml version='1.0' encoding='utf-8'?>
<Granule>
  <GranuleUR>HLS-VI.L30.T06WVS.2024120T211159.v2.0</GranuleUR>
  <Temporal>
    <RangeDateTime>
      <BeginningDateTime>2024-04-29T21:11:59.722175Z</BeginningDateTime>
      <EndingDateTime>2024-04-29T21:12:23.605464Z</EndingDateTime>
    </RangeDateTime>
  </Temporal>
  <Spatial>
    <HorizontalSpatialDomain>
      <Geometry>
        <GPolygon>
          <Boundary>
            <Point><PointLongitude>-146.9</PointLongitude><PointLatitude>64.0</PointLatitude></Point>
            <Point><PointLongitude>-144.8</PointLongitude><PointLatitude>64.1</PointLatitude></Point>
            <Point><PointLongitude>-144.9</PointLongitude><PointLatitude>65.0</PointLatitude></Point>
            <Point><PointLongitude>-147.0</PointLongitude><PointLatitude>64.9</PointLatitude></Point>
          </Boundary>
        </GPolygon>
      </Geometry>
    </HorizontalSpatialDomain>
  </Spatial>
  <Platforms>
    <Platform>
      <ShortName>LANDSAT-8</ShortName>
      <Instruments>
        <Instrument>
          <ShortName>OLI</ShortName>
        </Instrument>
      </Instruments>
    </Platform>
  </Platforms>
  <AdditionalAttributes>
    <AdditionalAttribute>
      <Name>CLOUD_COVERAGE</Name>
      <Values><Value>7</Value></Values>
    </AdditionalAttribute>
    <AdditionalAttribute>
      <Name>MGRS_TILE_ID</Name>
      <Values><Value>06WVS</Value></Values>
    </AdditionalAttribute>
    <AdditionalAttribute>
      <Name>MEAN_SUN_AZIMUTH_ANGLE</Name>
      <Values><Value>160.5</Value><Value>161.0</Value></Values>
    </AdditionalAttribute>
    <AdditionalAttribute>
      <Name>MEAN_VIEW_AZIMUTH_ANGLE</Name>
      <Values><Value>101.25</Value></Values>
    </AdditionalAttribute>
    <AdditionalAttribute>
      <Name>IDENTIFIER_PRODUCT_DOI</Name>
      <Values><Value>10.5067/HLS/HLSL30_VI.002</Value></Values>
    </AdditionalAttribute>
  </AdditionalAttributes>
</Granule>
"#;

    fn grid() -> GridGeometry {
        GridGeometry {
            width: 3660,
            height: 3660,
            geotransform: [399_960.0, 30.0, 0.0, 7_200_000.0, 0.0, -30.0],
            projection: String::new(),
        }
    }

    #[test]
    fn item_from_cmr() {
        let item = cmr_to_item(SAMPLE, &grid(), &StacOptions::default()).unwrap();
        assert_eq!(item.id, "HLS-VI.L30.T06WVS.2024120T211159.v2.0");

        let ring = &item.geometry.coordinates[0][0];
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);
        assert_eq!(item.bbox, [-147.0, 64.0, -144.8, 65.0]);

        let p = &item.properties;
        assert_eq!(p.datetime, "2024-04-29T21:11:59.722175Z");
        assert_eq!(p.start_datetime, p.datetime);
        assert_eq!(p.end_datetime, "2024-04-29T21:12:23.605464Z");
        assert_eq!(p.platform, "landsat-8");
        assert_eq!(p.instruments, vec!["oli".to_string()]);
        assert_eq!(p.epsg, Some(32606));
        assert_abs_diff_eq!(p.cloud_cover.unwrap(), 7.0);
        assert_abs_diff_eq!(p.sun_azimuth.unwrap(), 160.5);
        assert_abs_diff_eq!(p.view_azimuth.unwrap(), 101.25);
        assert_eq!(p.doi.as_deref(), Some("10.5067/HLS/HLSL30_VI.002"));
        assert_eq!(
            p.transform,
            [30.0, 0.0, 399_960.0, 0.0, -30.0, 7_200_000.0, 0.0, 0.0, 1.0]
        );
        assert_eq!(p.shape, [3660, 3660]);
    }

    #[test]
    fn assets_and_links_point_at_the_daac() {
        let item = cmr_to_item(SAMPLE, &grid(), &StacOptions::default()).unwrap();
        let base = "https://data.lpdaac.earthdatacloud.nasa.gov";
        let id = "HLS-VI.L30.T06WVS.2024120T211159.v2.0";

        assert_eq!(item.assets.len(), VegetationIndex::ALL.len() + 1);
        let ndvi = &item.assets["NDVI"];
        assert_eq!(
            ndvi.href,
            format!("{base}/lp-prod-protected/HLSL30.020/{id}/{id}.NDVI.tif")
        );
        assert_eq!(ndvi.media_type, COG_MEDIA_TYPE);
        assert_eq!(ndvi.roles, vec!["data"]);
        assert_eq!(ndvi.bands[0].common_name, "NDVI");

        let thumbnail = &item.assets["thumbnail"];
        assert_eq!(thumbnail.href, format!("{base}/lp-prod-public/HLSL30.020/{id}/{id}.jpg"));
        assert_eq!(thumbnail.roles, vec!["thumbnail"]);
        assert_eq!(
            item.links[0].href,
            format!("{base}/lp-prod-public/HLSL30.020/{id}/{id}_stac.json")
        );

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "Feature");
        assert_eq!(json["geometry"]["type"], "MultiPolygon");
        assert_eq!(json["properties"]["proj:epsg"], 32606);
        assert_eq!(json["properties"]["eo:cloud_cover"], 7.0);
        assert!(json["assets"]["thumbnail"].get("eo:bands").is_none());
    }

    #[test]
    fn custom_endpoint_and_version() {
        let options = StacOptions {
            endpoint: "example.org".into(),
            version: "021".into(),
        };
        let item = cmr_to_item(SAMPLE, &grid(), &options).unwrap();
        assert!(item.assets["TVI"].href.starts_with("https://example.org/lp-prod-protected/HLSL30.021/"));
    }

    #[test]
    fn absent_attributes_are_omitted() {
        let start = SAMPLE.find("<AdditionalAttributes>").unwrap();
        let end = SAMPLE.find("</AdditionalAttributes>").unwrap() + "</AdditionalAttributes>".len();
        let xml = format!("{}{}", &SAMPLE[..start], &SAMPLE[end..]);
        let item = cmr_to_item(&xml, &grid(), &StacOptions::default()).unwrap();
        let json = serde_json::to_value(&item.properties).unwrap();
        for key in ["eo:cloud_cover", "proj:epsg", "view:sun_azimuth", "view:azimuth", "sci:doi"] {
            assert!(json.get(key).is_none(), "{key}");
        }
        assert!(json.get("proj:transform").is_some());
    }

    #[test]
    fn instrument_and_tile_names() {
        assert_eq!(instrument_name("Sentinel-2A MSI"), "msi");
        assert_eq!(instrument_name("OLI"), "oli");
        assert_eq!(utm_epsg("T13RCN").unwrap(), 32613);
        assert!(utm_epsg("x").is_err());
    }

    #[test]
    fn incomplete_documents_are_metadata_errors() {
        let no_ur = SAMPLE.replace(
            "<GranuleUR>HLS-VI.L30.T06WVS.2024120T211159.v2.0</GranuleUR>",
            "",
        );
        let no_polygon = SAMPLE.replace("GPolygon", "Polygon");
        let bad_time = SAMPLE.replace("2024-04-29T21:11:59.722175Z", "yesterday");
        let bad_cloud = SAMPLE.replace("<Value>7</Value>", "<Value>cloudy</Value>");
        for xml in [no_ur, no_polygon, bad_time, bad_cloud] {
            let err = cmr_to_item(&xml, &grid(), &StacOptions::default()).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Metadata);
        }
    }

    #[test]
    fn ndvi_raster_next_to_cmr() {
        assert_eq!(
            ndvi_path_for(Path::new("/out/HLS-VI.L30.T06WVS.2024120T211159.v2.0.cmr.xml")),
            Path::new("/out/HLS-VI.L30.T06WVS.2024120T211159.v2.0.NDVI.tif")
        );
    }
}
