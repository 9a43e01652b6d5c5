use geo::{BoundingRect, Distance as _, Haversine};
use geo_types::{MultiPoint, Point};
use html_escape::encode_text;
use serde_json::{Value, json};

use crate::model::{Coordinate, EnrichedRoute, RoutePreference, WeatherFacts};
use crate::pipeline::RoutePlan;
use crate::traffic_color::TrafficColor;

const TRAFFIC_WEIGHT: u32 = 8;
const TRAFFIC_OPACITY: f64 = 0.8;
const ROUTE_WEIGHT: u32 = 4;
const ROUTE_OPACITY: f64 = 0.7;
const ORIGIN_CIRCLE_RADIUS_METERS: f64 = 30.0;

/// Great-circle length of a route in meters
pub fn route_length_meters(geometry: &[Coordinate]) -> f64 {
    geometry
        .windows(2)
        .map(|pair| Haversine.distance(Point::from(pair[0]), Point::from(pair[1])))
        .sum()
}

pub fn weather_popup(weather: &WeatherFacts) -> String {
    format!(
        r#"<div style="min-width: 150px">
    <h4 style="margin:0 0 5px 0">Current Weather</h4>
    <div>Temperature: {}°C</div>
    <div>Humidity: {}%</div>
    <div>Wind: {}</div>
    <div>{}</div>
</div>"#,
        encode_text(&weather.temperature_label()),
        encode_text(&weather.humidity_label()),
        encode_text(&weather.wind_direction),
        encode_text(&weather.air_quality),
    )
}

fn line_feature(coordinates: Vec<[f64; 2]>, properties: Value) -> Value {
    json!({
        "type": "Feature",
        "properties": properties,
        "geometry": {
            "type": "LineString",
            "coordinates": coordinates
        }
    })
}

fn point_feature(at: Coordinate, properties: Value) -> Value {
    json!({
        "type": "Feature",
        "properties": properties,
        "geometry": {
            "type": "Point",
            "coordinates": at.to_lng_lat()
        }
    })
}

fn route_features(enriched: &EnrichedRoute, duration: Option<&String>) -> Vec<Value> {
    let mut features: Vec<Value> = enriched
        .segments
        .iter()
        .map(|segment| {
            line_feature(
                vec![segment.from.to_lng_lat(), segment.to.to_lng_lat()],
                json!({
                    "kind": "traffic",
                    "route": enriched.route.display_name,
                    "severity": segment.color.label(),
                    "color": segment.color.hex(),
                    "weight": TRAFFIC_WEIGHT,
                    "opacity": TRAFFIC_OPACITY,
                }),
            )
        })
        .collect();

    let route = &enriched.route;
    let length_km = route
        .distance_meters
        .unwrap_or_else(|| route_length_meters(&route.geometry))
        / 1000.0;
    let dash_array = match route.preference {
        RoutePreference::Shortest => Some("5,5"),
        RoutePreference::Fastest => None,
    };
    let popup = format!(
        "{} ({:.1} km){}",
        duration.map(String::as_str).unwrap_or(route.display_name.as_str()),
        length_km,
        if enriched.simulated_traffic {
            ", simulated traffic"
        } else {
            ""
        }
    );

    features.push(line_feature(
        route.geometry.iter().map(|c| c.to_lng_lat()).collect(),
        json!({
            "kind": "route",
            "name": route.display_name,
            "color": route.display_color,
            "weight": ROUTE_WEIGHT,
            "opacity": ROUTE_OPACITY,
            "dashArray": dash_array,
            "popup": encode_text(&popup),
        }),
    ));
    features
}

/// `[min_lng, min_lat, max_lng, max_lat]` over every drawn coordinate
fn bounds(plan: &RoutePlan) -> Option<[f64; 4]> {
    let points: Vec<Point<f64>> = plan
        .routes
        .iter()
        .flat_map(|r| r.route.geometry.iter().copied())
        .chain([plan.origin, plan.destination])
        .map(Point::from)
        .collect();
    MultiPoint::from(points)
        .bounding_rect()
        .map(|rect| [rect.min().x, rect.min().y, rect.max().x, rect.max().y])
}

/// GeoJSON document holding every layer of the result map.
pub fn map_geojson(plan: &RoutePlan) -> Value {
    let mut features: Vec<Value> = plan
        .routes
        .iter()
        .enumerate()
        .flat_map(|(i, route)| route_features(route, plan.durations.get(i)))
        .collect();

    features.push(point_feature(
        plan.origin,
        json!({
            "kind": "origin",
            "marker_color": "green",
            "popup": weather_popup(&plan.weather),
            "circle_radius": ORIGIN_CIRCLE_RADIUS_METERS,
            "circle_color": "blue",
        }),
    ));
    features.push(point_feature(
        plan.destination,
        json!({
            "kind": "destination",
            "marker_color": "red",
            "popup": "Destination",
        }),
    ));

    let mut collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    if let Some(bbox) = bounds(plan) {
        collection["bbox"] = json!(bbox);
    }
    collection
}

fn legend() -> String {
    let swatch = |color: &str, label: &str| {
        format!(
            r#"<div><i style="background:{}; width:20px; height:10px; display:inline-block;"></i> {}</div>"#,
            color, label
        )
    };

    let mut html = String::from(
        r#"<div class="legend"><h4 style="margin:0 0 5px 0">Traffic Conditions</h4>"#,
    );
    for color in TrafficColor::ALL {
        html.push_str(&swatch(color.hex(), color.label()));
    }
    html.push_str(r#"<h4 style="margin:10px 0 5px 0">Routes</h4>"#);
    for preference in RoutePreference::ALL {
        html.push_str(&swatch(preference.display_color(), preference.display_name()));
    }
    html.push_str("</div>");
    html
}

const MAP_SCRIPT: &str = r#"
(function () {
  var data = JSON.parse(document.getElementById('route-data').textContent);
  var map = L.map('map');
  L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
    attribution: '&copy; OpenStreetMap contributors'
  }).addTo(map);
  var markerIcon = function (color) {
    return L.divIcon({className: 'marker-' + color, html: '<span style="color:' + color + '">&#9679;</span>'});
  };
  L.geoJSON(data, {
    style: function (f) {
      var p = f.properties;
      return {color: p.color, weight: p.weight, opacity: p.opacity, dashArray: p.dashArray || null};
    },
    pointToLayer: function (f, latlng) {
      var p = f.properties;
      if (p.circle_radius) {
        L.circle(latlng, {radius: p.circle_radius, color: p.circle_color, fill: false, weight: 3}).addTo(map);
      }
      return L.marker(latlng, {icon: markerIcon(p.marker_color)});
    },
    onEachFeature: function (f, layer) {
      if (f.properties.popup) { layer.bindPopup(f.properties.popup); }
    }
  }).addTo(map);
  if (data.bbox) {
    map.fitBounds([[data.bbox[1], data.bbox[0]], [data.bbox[3], data.bbox[2]]]);
  } else {
    map.setView([0, 0], 2);
  }
})();
"#;

/// Self-contained map fragment (Leaflet) for a successful plan.
pub fn map_document(plan: &RoutePlan) -> String {
    // Keep the embedded JSON from closing its own script tag
    let data = map_geojson(plan).to_string().replace("</", "<\\/");
    format!(
        r#"<div id="map" style="height: 600px"></div>
{}
<script type="application/json" id="route-data">{}</script>
<script>{}</script>"#,
        legend(),
        data,
        MAP_SCRIPT
    )
}

/// The full page: the query form, then either durations (and a map) or nothing.
pub fn render_index(durations: Option<&[String]>, map_html: Option<&str>) -> String {
    let durations_html = durations
        .map(|lines| {
            let items: String = lines
                .iter()
                .map(|line| format!("<li>{}</li>", encode_text(line)))
                .collect();
            format!(r#"<ul class="durations">{}</ul>"#, items)
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Route traffic</title>
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
  <style>
    .legend {{ position: fixed; bottom: 50px; left: 50px; width: 180px; z-index: 1000;
              background: white; padding: 10px; border-radius: 5px; box-shadow: 0 0 5px rgba(0,0,0,0.3); }}
  </style>
</head>
<body>
  <form method="post" action="/">
    <label><input type="checkbox" name="use_current_location" value="true"> Use current location</label>
    <input type="hidden" name="lat1" id="lat1">
    <input type="hidden" name="lng1" id="lng1">
    <input type="text" name="start_address" placeholder="Start address">
    <input type="text" name="destination" placeholder="Destination" required>
    <select name="vehicle_type">
      <option value="car">Car</option>
      <option value="walking">Walking</option>
    </select>
    <button type="submit">Show routes</button>
  </form>
  <script>
    if (navigator.geolocation) {{
      navigator.geolocation.getCurrentPosition(function (pos) {{
        document.getElementById('lat1').value = pos.coords.latitude;
        document.getElementById('lng1').value = pos.coords.longitude;
      }});
    }}
  </script>
  {}
  {}
</body>
</html>"#,
        durations_html,
        map_html.unwrap_or_default()
    )
}
