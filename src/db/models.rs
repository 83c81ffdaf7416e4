//! Database model types.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

/// A numeric reading reported by a weather station.
///
/// Rule files may refer to a field either by its station column name
/// (`WC_temp`) or by its snake_case name (`temperature`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WeatherField {
    Temperature,
    Humidity,
    PrecipRate,
    PrecipTotal,
    Pressure,
    HeatIndex,
    WindSpeed,
    WindGust,
    WindChill,
    WindDir,
    DewPoint,
    SolarRadiation,
    Uv,
}

impl WeatherField {
    /// Every field, in table column order.
    pub const ALL: [WeatherField; 13] = [
        Self::Temperature,
        Self::Humidity,
        Self::PrecipRate,
        Self::PrecipTotal,
        Self::Pressure,
        Self::HeatIndex,
        Self::WindSpeed,
        Self::WindGust,
        Self::WindChill,
        Self::WindDir,
        Self::DewPoint,
        Self::SolarRadiation,
        Self::Uv,
    ];

    /// Column in the `weather_conditions` table. Only these names are ever
    /// interpolated into SQL.
    pub fn column(self) -> &'static str {
        match self {
            Self::Temperature => "temp",
            Self::Humidity => "humidity",
            Self::PrecipRate => "precip_rate",
            Self::PrecipTotal => "precip_total",
            Self::Pressure => "pressure",
            Self::HeatIndex => "heat_index",
            Self::WindSpeed => "wind_speed",
            Self::WindGust => "wind_gust",
            Self::WindChill => "wind_chill",
            Self::WindDir => "wind_dir",
            Self::DewPoint => "dew_point",
            Self::SolarRadiation => "solar_radiation",
            Self::Uv => "uv",
        }
    }

    /// Name used by the station uploader and in rule files.
    pub fn station_name(self) -> &'static str {
        match self {
            Self::Temperature => "WC_temp",
            Self::Humidity => "WC_humidity",
            Self::PrecipRate => "WC_precipRate",
            Self::PrecipTotal => "WC_precipTotal",
            Self::Pressure => "WC_pressure",
            Self::HeatIndex => "WC_heatIndex",
            Self::WindSpeed => "WC_windSpeed",
            Self::WindGust => "WC_windGust",
            Self::WindChill => "WC_windChill",
            Self::WindDir => "WC_winddir",
            Self::DewPoint => "WC_dewpt",
            Self::SolarRadiation => "WC_solarRadiation",
            Self::Uv => "WC_uv",
        }
    }

    /// Human readable snake_case name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::PrecipRate => "precip_rate",
            Self::PrecipTotal => "precip_total",
            Self::Pressure => "pressure",
            Self::HeatIndex => "heat_index",
            Self::WindSpeed => "wind_speed",
            Self::WindGust => "wind_gust",
            Self::WindChill => "wind_chill",
            Self::WindDir => "wind_dir",
            Self::DewPoint => "dew_point",
            Self::SolarRadiation => "solar_radiation",
            Self::Uv => "uv",
        }
    }
}

impl FromStr for WeatherField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.station_name() == s || f.label() == s)
            .ok_or_else(|| format!("unknown weather field: {s}"))
    }
}

impl fmt::Display for WeatherField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.station_name())
    }
}

/// One sampling interval reported by a station.
///
/// Times are timezone-naive local station time. Any reading may be absent
/// when the sensor did not report.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub station_key: String,
    pub time: NaiveDateTime,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub precip_rate: Option<f64>,
    pub precip_total: Option<f64>,
    pub pressure: Option<f64>,
    pub heat_index: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_gust: Option<f64>,
    pub wind_chill: Option<f64>,
    pub wind_dir: Option<f64>,
    pub dew_point: Option<f64>,
    pub solar_radiation: Option<f64>,
    pub uv: Option<f64>,
}

impl Observation {
    /// An observation with no readings.
    pub fn new(station_key: impl Into<String>, time: NaiveDateTime) -> Self {
        Self {
            station_key: station_key.into(),
            time,
            temperature: None,
            humidity: None,
            precip_rate: None,
            precip_total: None,
            pressure: None,
            heat_index: None,
            wind_speed: None,
            wind_gust: None,
            wind_chill: None,
            wind_dir: None,
            dew_point: None,
            solar_radiation: None,
            uv: None,
        }
    }

    pub fn value(&self, field: WeatherField) -> Option<f64> {
        match field {
            WeatherField::Temperature => self.temperature,
            WeatherField::Humidity => self.humidity,
            WeatherField::PrecipRate => self.precip_rate,
            WeatherField::PrecipTotal => self.precip_total,
            WeatherField::Pressure => self.pressure,
            WeatherField::HeatIndex => self.heat_index,
            WeatherField::WindSpeed => self.wind_speed,
            WeatherField::WindGust => self.wind_gust,
            WeatherField::WindChill => self.wind_chill,
            WeatherField::WindDir => self.wind_dir,
            WeatherField::DewPoint => self.dew_point,
            WeatherField::SolarRadiation => self.solar_radiation,
            WeatherField::Uv => self.uv,
        }
    }

    pub fn set_value(&mut self, field: WeatherField, value: Option<f64>) {
        let slot = match field {
            WeatherField::Temperature => &mut self.temperature,
            WeatherField::Humidity => &mut self.humidity,
            WeatherField::PrecipRate => &mut self.precip_rate,
            WeatherField::PrecipTotal => &mut self.precip_total,
            WeatherField::Pressure => &mut self.pressure,
            WeatherField::HeatIndex => &mut self.heat_index,
            WeatherField::WindSpeed => &mut self.wind_speed,
            WeatherField::WindGust => &mut self.wind_gust,
            WeatherField::WindChill => &mut self.wind_chill,
            WeatherField::WindDir => &mut self.wind_dir,
            WeatherField::DewPoint => &mut self.dew_point,
            WeatherField::SolarRadiation => &mut self.solar_radiation,
            WeatherField::Uv => &mut self.uv,
        };
        *slot = value;
    }

    /// Builder-style variant of [`Observation::set_value`].
    pub fn with(mut self, field: WeatherField, value: f64) -> Self {
        self.set_value(field, Some(value));
        self
    }
}

/// Last firing of an alert for a station.
#[derive(Debug, Clone, PartialEq)]
pub struct CooldownRecord {
    pub alert_name: String,
    pub station_key: String,
    pub last_sent: NaiveDateTime,
    pub cooldown_minutes: i64,
}
