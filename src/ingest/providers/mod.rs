pub mod usgs_geojson;
