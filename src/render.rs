use crate::map::{IconSpec, MapDocument};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use geo::Point;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use image::ImageFormat;
use serde_json::json;
use std::fs;
use tracing::{debug, warn};

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>__TITLE__</title>
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
  <link rel="stylesheet" href="https://unpkg.com/leaflet.markercluster@1.5.3/dist/MarkerCluster.css" />
  <link rel="stylesheet" href="https://unpkg.com/leaflet.markercluster@1.5.3/dist/MarkerCluster.Default.css" />
  <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/Leaflet.awesome-markers/2.0.2/leaflet.awesome-markers.css" />
  <link rel="stylesheet" href="https://netdna.bootstrapcdn.com/bootstrap/3.0.0/css/bootstrap-glyphicons.css" />
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
  <script src="https://unpkg.com/leaflet.markercluster@1.5.3/dist/leaflet.markercluster.js"></script>
  <script src="https://cdnjs.cloudflare.com/ajax/libs/Leaflet.awesome-markers/2.0.2/leaflet.awesome-markers.js"></script>
  <style>
    html, body { width: 100%; height: 100%; margin: 0; padding: 0; }
    #map { position: absolute; top: 0; bottom: 0; right: 0; left: 0; }
  </style>
</head>
<body>
  <div id="map"></div>
  <script>
    const DATA = __MAP_DATA__;

    const map = L.map('map').setView(DATA.center, DATA.zoom);
    L.tileLayer(DATA.tiles, { attribution: DATA.attribution, maxZoom: 19 }).addTo(map);

    function bind(layer, props) {
      layer.bindTooltip(props.tooltip);
      layer.bindPopup(props.popup, { maxWidth: 300 });
      return layer;
    }

    const overlays = {};

    DATA.categories.forEach(function (cat) {
      overlays[cat.name] = L.geoJSON(cat.features, {
        pointToLayer: function (feature, latlng) {
          const icon = L.AwesomeMarkers.icon({
            icon: 'info-sign',
            prefix: 'glyphicon',
            markerColor: feature.properties.color
          });
          return bind(L.marker(latlng, { icon: icon }), feature.properties);
        }
      }).addTo(map);
    });

    overlays[DATA.bubbles.name] = L.geoJSON(DATA.bubbles.features, {
      pointToLayer: function (feature, latlng) {
        const p = feature.properties;
        return bind(L.circleMarker(latlng, {
          radius: p.radius,
          color: p.color,
          fill: true,
          fillColor: p.fillColor,
          fillOpacity: p.fillOpacity
        }), p);
      }
    }).addTo(map);

    const stationIcon = L.icon({
      iconUrl: DATA.stations.icon.url,
      iconSize: DATA.stations.icon.size
    });
    const cluster = L.markerClusterGroup();
    L.geoJSON(DATA.stations.features, {
      pointToLayer: function (feature, latlng) {
        return bind(L.marker(latlng, { icon: stationIcon }), feature.properties);
      }
    }).eachLayer(function (layer) { cluster.addLayer(layer); });
    overlays[DATA.stations.name] = L.featureGroup([cluster]).addTo(map);

    L.control.layers(null, overlays, { collapsed: DATA.collapsed }).addTo(map);
  </script>
</body>
</html>
"#;

/// Renders the whole document as one HTML page. The station icon is read
/// and inlined here, so a missing icon file fails the render.
pub fn render_html(doc: &MapDocument, title: &str) -> Result<String> {
    let icon_url = icon_data_url(&doc.station_layer.icon)?;

    let categories: Vec<serde_json::Value> = doc.category_layers.iter().map(|layer| {
        let features = layer.markers.iter().map(|m| point_feature(m.location, json!({
            "tooltip": m.tooltip,
            "popup": m.popup_html,
            "color": m.color,
        }))).collect();
        json!({ "name": layer.name, "features": collection(features) })
    }).collect();

    let bubbles = doc.bubble_layer.bubbles.iter().map(|b| point_feature(b.location, json!({
        "tooltip": b.tooltip,
        "popup": b.popup_html,
        "radius": b.radius,
        "color": b.color,
        "fillColor": b.fill_color,
        "fillOpacity": b.fill_opacity,
    }))).collect();

    let stations = doc.station_layer.markers.iter().map(|s| point_feature(s.location, json!({
        "tooltip": s.tooltip,
        "popup": s.popup,
    }))).collect();

    let payload = json!({
        "center": [doc.center.y(), doc.center.x()],
        "zoom": doc.zoom,
        "tiles": doc.tiles,
        "attribution": doc.attribution,
        "collapsed": doc.layer_control_collapsed,
        "categories": categories,
        "bubbles": {
            "name": doc.bubble_layer.name,
            "features": collection(bubbles),
        },
        "stations": {
            "name": doc.station_layer.name,
            "icon": { "url": icon_url, "size": doc.station_layer.icon.size },
            "features": collection(stations),
        },
    });

    // "</script>" inside a popup must not close the script block
    let data = serde_json::to_string(&payload)
        .context("Failed to serialize map data")?
        .replace("</", "<\\/");

    debug!(bytes = data.len(), "Serialized map payload");

    Ok(PAGE_TEMPLATE
        .replace("__TITLE__", &crate::map::escape_html(title))
        .replace("__MAP_DATA__", &data))
}

fn point_feature(location: Point<f64>, properties: serde_json::Value) -> Feature {
    let properties: Option<JsonObject> = match properties {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    };

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![location.x(), location.y()]))),
        id: None,
        properties,
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn icon_data_url(icon: &IconSpec) -> Result<String> {
    let bytes = fs::read(&icon.path)
        .with_context(|| format!("Failed to read station icon: {:?}", icon.path))?;

    let mime = match image::guess_format(&bytes) {
        Ok(format) => image_mime(format),
        Err(_) if icon.path.extension().is_some_and(|e| e.eq_ignore_ascii_case("svg")) => "image/svg+xml",
        Err(_) => {
            warn!(path = ?icon.path, "Unrecognised icon image format");
            "application/octet-stream"
        }
    };

    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(&bytes)))
}

fn image_mime(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Ico => "image/x-icon",
        _ => "application/octet-stream",
    }
}
