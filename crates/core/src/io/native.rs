//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate for single-band I/O. Only the tags needed to route
//! flow are read and written: pixel scale (cell size), tiepoint (origin)
//! and `GDAL_NODATA`. Coordinate reference systems are not handled.

use crate::error::{Error, Result};
use crate::raster::{CellSize, Raster, RasterElement};
use num_traits::NumCast;
use std::any::TypeId;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{
    ColorType, Gray16, Gray32, Gray32Float, Gray64Float, Gray8, GrayI16, GrayI32, GrayI64,
};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: Tag = Tag::ModelPixelScaleTag;
const MODEL_TIEPOINT: Tag = Tag::ModelTiepointTag;
const GEO_KEY_DIRECTORY: Tag = Tag::GeoKeyDirectoryTag;
const GDAL_NODATA: Tag = Tag::GdalNodata;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// Override the nodata value written to `GDAL_NODATA`.
    /// Defaults to the raster's own sentinel.
    pub nodata: Option<f64>,
}

/// Read the first band of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

/// Same as [`read_geotiff`] over an in-memory buffer
pub fn read_geotiff_from_buffer<T: RasterElement>(data: &[u8]) -> Result<Raster<T>> {
    decode_geotiff(Cursor::new(data))
}

fn tiff_error(context: &str) -> impl Fn(tiff::TiffError) -> Error + '_ {
    move |e| Error::Other(format!("{context}: {e}"))
}

fn cast_all<S: num_traits::NumCast + Copy, T: RasterElement>(buf: Vec<S>) -> Vec<T> {
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader).map_err(tiff_error("TIFF decode error"))?;
    let (width, height) = decoder
        .dimensions()
        .map_err(tiff_error("Cannot read dimensions"))?;
    let (rows, cols) = (height as usize, width as usize);

    let data: Vec<T> = match decoder
        .read_image()
        .map_err(tiff_error("Cannot read image data"))?
    {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        DecodingResult::U64(buf) => cast_all(buf),
        DecodingResult::I64(buf) => cast_all(buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    // Interleaved multi-band data fails the length check here
    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let (Ok(scale), Ok(tiepoint)) = (
        decoder.get_tag_f64_vec(MODEL_PIXEL_SCALE),
        decoder.get_tag_f64_vec(MODEL_TIEPOINT),
    ) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z]
            raster.set_cell_size(CellSize::new(scale[0], scale[1].abs())?);
            raster.set_origin(
                tiepoint[3] - tiepoint[0] * scale[0],
                tiepoint[4] + tiepoint[1] * scale[1].abs(),
            );
        }
    }

    if let Ok(text) = decoder.get_tag_ascii_string(GDAL_NODATA) {
        let parsed = text
            .trim_matches(char::from(0))
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(num_traits::cast::<f64, T>);
        raster.set_nodata(parsed);
    }

    Ok(raster)
}

/// Write a Raster to a single-band GeoTIFF whose sample type matches the cell type
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    encode_geotiff(raster, &mut writer, options.unwrap_or_default())?;
    writer.flush()?;
    Ok(())
}

/// Same as [`write_geotiff`] into a `Vec<u8>`
pub fn write_geotiff_to_buffer<T: RasterElement>(
    raster: &Raster<T>,
    options: Option<GeoTiffOptions>,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options.unwrap_or_default())?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(tiff_error("TIFF encoder error"))?;
    let kind = TypeId::of::<T>();

    // Samples keep the cell type so f64 gradients and large counts survive
    if kind == TypeId::of::<u8>() {
        encode_band::<Gray8, _, _>(&mut encoder, raster, &options)
    } else if kind == TypeId::of::<u16>() {
        encode_band::<Gray16, _, _>(&mut encoder, raster, &options)
    } else if kind == TypeId::of::<u32>() {
        encode_band::<Gray32, _, _>(&mut encoder, raster, &options)
    } else if kind == TypeId::of::<i16>() {
        encode_band::<GrayI16, _, _>(&mut encoder, raster, &options)
    } else if kind == TypeId::of::<i32>() {
        encode_band::<GrayI32, _, _>(&mut encoder, raster, &options)
    } else if kind == TypeId::of::<i64>() {
        encode_band::<GrayI64, _, _>(&mut encoder, raster, &options)
    } else if kind == TypeId::of::<f32>() {
        encode_band::<Gray32Float, _, _>(&mut encoder, raster, &options)
    } else {
        encode_band::<Gray64Float, _, _>(&mut encoder, raster, &options)
    }
}

fn encode_band<C, T, W>(
    encoder: &mut TiffEncoder<W>,
    raster: &Raster<T>,
    options: &GeoTiffOptions,
) -> Result<()>
where
    C: ColorType,
    C::Inner: NumCast + Default,
    [C::Inner]: TiffValue,
    T: RasterElement,
    W: Write + Seek,
{
    let (rows, cols) = raster.shape();

    let data: Vec<C::Inner> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or_default())
        .collect();

    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(tiff_error("Cannot create TIFF image"))?;

    let cell = raster.cell_size();
    let (origin_x, origin_y) = raster.origin();
    let scale = [cell.dx, cell.dy, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, origin_x, origin_y, 0.0];
    // GTModelTypeGeoKey = projected, GTRasterTypeGeoKey = pixel is area
    let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];

    let tags = image.encoder();
    tags.write_tag(MODEL_PIXEL_SCALE, &scale[..])
        .map_err(tiff_error("Cannot write scale tag"))?;
    tags.write_tag(MODEL_TIEPOINT, &tiepoint[..])
        .map_err(tiff_error("Cannot write tiepoint tag"))?;
    tags.write_tag(GEO_KEY_DIRECTORY, &geokeys[..])
        .map_err(tiff_error("Cannot write geokey tag"))?;

    let nodata = options
        .nodata
        .or_else(|| raster.nodata().and_then(|nd| nd.as_f64()));
    if let Some(nd) = nodata {
        tags.write_tag(GDAL_NODATA, nd.to_string().as_str())
            .map_err(tiff_error("Cannot write nodata tag"))?;
    }

    image
        .write_data(&data)
        .map_err(tiff_error("Cannot write image data"))?;

    Ok(())
}
