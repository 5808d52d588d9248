//! Wyoming DOT pilot streams (ODE JSON output).

use super::{stream_name, MessageType, Provider};
use crate::flatten::extension::{ExtensionRule, PayloadLayout};
use crate::flatten::splitter::SplitRule;
use crate::flatten::steps::{PostStep, MICRODEGREE_SCALE};
use crate::flatten::types::{FieldRules, RenameRules, RuleSet};
use serde_json::json;

const METADATA_PREFIX_RENAMES: [(&str, &str); 2] = [
    ("metadata_receivedMessageDetails_locationData", "metadata_rmd"),
    ("metadata_receivedMessageDetails", "metadata_rmd"),
];

const METADATA_RENAMES: [(&str, &str); 2] = [
    ("metadata_odeReceivedAt", "metadata_received_At"),
    ("payload_dataType", "dataType"),
];

const RECEIVED_AT: &str = "metadata_received_At";

fn with_metadata(prefix: &[(&'static str, &'static str)], exact: &[(&'static str, &'static str)]) -> RenameRules {
    let prefix: Vec<_> = METADATA_PREFIX_RENAMES.iter().chain(prefix).copied().collect();
    let exact: Vec<_> = METADATA_RENAMES.iter().chain(exact).copied().collect();
    RenameRules::new(&prefix, &exact)
}

pub fn bsm() -> RuleSet {
    let fields = FieldRules::new(with_metadata(
        &[("payload_data_coreData", "coreData")],
        &[
            ("coreData_position_longitude", "coreData_position_long"),
            ("coreData_position_latitude", "coreData_position_lat"),
            ("coreData_position_elevation", "coreData_elevation"),
        ],
    ))
    .with_json_string_fields(&["coreData_size", "payload_data_coreData_size"]);

    let part2 = FieldRules::new(RenameRules::new(
        &[
            ("pathHistory", "part2_vse_ph"),
            ("pathPrediction", "part2_vse_pp"),
            ("classDetails", "part2_suve_cd"),
            ("vehicleAlerts", "part2_spve_vehalert"),
            ("description", "part2_spve_event"),
            ("trailers", "part2_spve_tr"),
            ("events", "part2_vse_events"),
        ],
        &[
            ("part2_vse_ph_crumbData", "part2_vse_ph_crumbdata"),
            ("part2_vse_pp_radiusOfCurve", "part2_vse_pp_radiusofcurve"),
            ("lights", "part2_vse_lights"),
            ("part2_suve_cd_height", "part2_suve_vd_height"),
            ("part2_suve_cd_mass", "part2_suve_vd_mass"),
            ("part2_suve_cd_trailerWeight", "part2_suve_vd_trailerweight"),
            ("part2_spve_vehalert_event_sspRights", "part2_spve_vehalert_events_sspRights"),
            ("part2_spve_vehalert_event_events", "part2_spve_vehalert_events_events"),
            ("part2_spve_event_description", "part2_spve_event_desc"),
            ("part2_spve_tr_sspRights", "part2_spve_tr_ssprights"),
            ("part2_spve_tr_connection", "part2_spve_tr_conn"),
        ],
    ))
    .with_json_string_fields(&["part2_vse_events", "part2_vse_ph_crumbdata"]);

    RuleSet::new(stream_name(Provider::Wydot, MessageType::Bsm), fields)
        .with_extension(
            ExtensionRule::new(&["payload", "data", "partII"], PayloadLayout::Direct, part2)
                .with_entry_key("value"),
        )
        .with_steps(vec![
            PostStep::geo_point("coreData_position_lat", "coreData_position_long", "coreData_position"),
            PostStep::normalize_timestamp(RECEIVED_AT),
        ])
}

pub fn tim() -> RuleSet {
    let fields = FieldRules::new(with_metadata(
        &[
            (
                "payload_data_MessageFrame_value_traveler_Information_dataFrames_traveler_dataframe",
                "traveler_dataframe",
            ),
            ("payload_data_MessageFrame_value_traveler_Information", "traveler_Information"),
            ("_SEQUENCE", "_sequence"),
            ("traveler_dataframe_msgId_roadSignID_position", "traveler_dataframe_msgId"),
            ("traveler_dataframe_msgId_roadSignID", "traveler_dataframe_msgId"),
            ("traveler_dataframe_regions_Geographical_Path_anchor", "traveler_dataframe_anchor"),
            (
                "traveler_dataframe_regions_Geographical_Path_description_path",
                "traveler_dataframe_desc",
            ),
            ("traveler_dataframe_regions_Geographical_Path", "traveler_dataframe"),
        ],
        &[
            ("payload_data_MessageFrame_messageId", "messageId"),
            ("traveler_dataframe_desc_offset_xy_nodes_NodeXY", "traveler_dataframe_desc_nodes"),
        ],
    ))
    .with_json_string_fields(&["traveler_dataframe_desc_nodes"]);

    let split = SplitRule::new(&[
        "payload",
        "data",
        "MessageFrame",
        "value",
        "traveler_Information",
        "dataFrames",
    ])
    .with_entry_paths(&[&["traveler_dataframe"], &["dataFrames", "traveler_dataframe"]])
    .rewrap_under(&["traveler_dataframe"])
    .with_nested(SplitRule::new(&["regions", "Geographical_Path"]))
    .skip_when(&["metadata", "schemaVersion"], json!(5));

    RuleSet::new(stream_name(Provider::Wydot, MessageType::Tim), fields)
        .with_split(split)
        .with_steps(vec![PostStep::scaled_geo_point(
            "traveler_dataframe_msgId_lat",
            "traveler_dataframe_msgId_long",
            "traveler_dataframe_msgId_position",
            MICRODEGREE_SCALE,
        )])
}

pub fn spat() -> RuleSet {
    let fields = FieldRules::new(with_metadata(
        &[("payload_data_intersectionStateList_intersectionStatelist_", "intersection_")],
        &[],
    ))
    .with_json_string_fields(&["intersection_states_movementList"]);

    RuleSet::new(stream_name(Provider::Wydot, MessageType::Spat), fields)
        .with_steps(vec![PostStep::normalize_timestamp(RECEIVED_AT)])
}
