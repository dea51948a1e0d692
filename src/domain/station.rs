use crate::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorType {
    Type1,
    Type2,
    Type3,
    TypeE,
    Schuko,
    Chademo,
    Combo,
    Tesla,
    CeeBlue,
    CeeRed,
    CeePlus,
    Cee2Poles,
    ThreePinSquare,
    Scame,
    Nema5,
    T13,
    T15,
    T23,
    Marechal,
    Unspecified,
}

impl ConnectorType {
    pub fn wire_name(self) -> Option<&'static str> {
        match self {
            Self::Type1 => Some("Type1"),
            Self::Type2 => Some("Type2"),
            Self::Type3 => Some("Type3"),
            Self::TypeE => Some("TypeE"),
            Self::Schuko => Some("Schuko"),
            Self::Chademo => Some("Chademo"),
            Self::Combo => Some("Combo"),
            Self::Tesla => Some("Tesla"),
            Self::CeeBlue => Some("CeeBlue"),
            Self::CeeRed => Some("CeeRed"),
            Self::CeePlus => Some("CeePlus"),
            Self::Cee2Poles => Some("Cee2Poles"),
            Self::ThreePinSquare => Some("ThreePinSquare"),
            Self::Scame => Some("Scame"),
            Self::Nema5 => Some("Nema5"),
            Self::T13 => Some("T13"),
            Self::T15 => Some("T15"),
            Self::T23 => Some("T23"),
            Self::Marechal => Some("Marechal"),
            Self::Unspecified => None,
        }
    }

    pub fn from_wire(value: &str) -> Self {
        match value {
            "Type1" => Self::Type1,
            "Type2" => Self::Type2,
            "Type3" => Self::Type3,
            "TypeE" => Self::TypeE,
            "Schuko" => Self::Schuko,
            "Chademo" => Self::Chademo,
            "Combo" => Self::Combo,
            "Tesla" => Self::Tesla,
            "CeeBlue" => Self::CeeBlue,
            "CeeRed" => Self::CeeRed,
            "CeePlus" => Self::CeePlus,
            "Cee2Poles" => Self::Cee2Poles,
            "ThreePinSquare" => Self::ThreePinSquare,
            "Scame" => Self::Scame,
            "Nema5" => Self::Nema5,
            "T13" => Self::T13,
            "T15" => Self::T15,
            "T23" => Self::T23,
            "Marechal" => Self::Marechal,
            _ => Self::Unspecified,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    pub id: String,
    pub connector_type: ConnectorType,
    pub speed_kw: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub street: String,
    pub street_number: String,
    pub city: String,
    pub zip: String,
    pub country: String,
}

// Contact fields are never null on the wire; absent values stay empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contact {
    pub phone: String,
    pub fax: String,
    pub web: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpeningHours {
    Open24h,
    Notes(String),
}

impl Default for OpeningHours {
    fn default() -> Self {
        Self::Notes(String::new())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Address,
    pub contact: Contact,
    pub operator_id: String,
    pub opening_hours: OpeningHours,
    pub connectors: Vec<Connector>,
    pub notes: String,
    pub reservable: bool,
    pub floor_level: Option<i32>,
    pub free_of_charge: bool,
    pub parking_spots: Option<u32>,
    pub green_power: bool,
    pub plugin_charge: bool,
    pub roofed: bool,
    pub private: bool,
    pub deleted: bool,
}

// Mutable working shape; a Station only exists once build() has accepted it.
#[derive(Debug, Clone, Default)]
pub struct StationDraft {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Address,
    pub contact: Contact,
    pub operator_id: String,
    pub opening_hours: OpeningHours,
    pub connectors: Vec<Connector>,
    pub notes: String,
    pub reservable: bool,
    pub floor_level: Option<i32>,
    pub free_of_charge: bool,
    pub parking_spots: Option<u32>,
    pub green_power: bool,
    pub plugin_charge: bool,
    pub roofed: bool,
    pub private: bool,
    pub deleted: bool,
}

impl StationDraft {
    pub fn build(self) -> Result<Station, DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::EmptyStationName);
        }
        if self.connectors.is_empty() {
            return Err(DomainError::NoConnectors(self.id));
        }

        Ok(Station {
            id: self.id,
            name: self.name,
            description: self.description,
            latitude: self.latitude,
            longitude: self.longitude,
            address: self.address,
            contact: self.contact,
            operator_id: self.operator_id,
            opening_hours: self.opening_hours,
            connectors: self.connectors,
            notes: self.notes,
            reservable: self.reservable,
            floor_level: self.floor_level,
            free_of_charge: self.free_of_charge,
            parking_spots: self.parking_spots,
            green_power: self.green_power,
            plugin_charge: self.plugin_charge,
            roofed: self.roofed,
            private: self.private,
            deleted: self.deleted,
        })
    }
}

impl Station {
    pub fn with_deleted(&self, deleted: bool) -> Self {
        let mut updated = self.clone();
        updated.deleted = deleted;
        updated
    }
}
