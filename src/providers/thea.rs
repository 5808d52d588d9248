//! Tampa (THEA) pilot streams.

use super::{stream_name, MessageType, Provider};
use crate::flatten::extension::{ExtensionRule, PayloadLayout};
use crate::flatten::splitter::SplitRule;
use crate::flatten::steps::{PostStep, MICRODEGREE_SCALE};
use crate::flatten::types::{FieldRules, RenameRules, RuleSet};

const WHEEL_BRAKES: [&str; 5] = ["unavailable", "leftFront", "leftRear", "rightFront", "rightRear"];

pub fn bsm() -> RuleSet {
    let fields = FieldRules::new(RenameRules::new(
        &[("payload_data_coreData_", "core_Data_")],
        &[
            ("core_Data_lat", "core_Data_position_lat"),
            ("core_Data_long", "core_Data_position_long"),
            ("core_Data_elev", "core_Data_elevation"),
            ("core_Data_accelset_yaw", "core_Data_accelset_accelYaw"),
        ],
    ));

    // Order matters: classDetails_ must become part2_suve_cd_ before the
    // exact hpmsType rule runs.
    let part2 = FieldRules::new(RenameRules::new(
        &[
            ("classDetails_", "part2_suve_cd_"),
            ("vehicleData_", "part2_suve_vd_"),
            ("vehicleAlerts_events_", "part2_spve_vehalert_event_"),
            ("vehicleAlerts_", "part2_spve_vehalert_"),
            ("trailers_", "part2_spve_tr_"),
            ("description_", "part2_spve_event_"),
            ("events_", "part2_vse_events"),
            ("pathHistory_", "part2_vse_ph_"),
            ("pathPrediction_", "part2_vse_pp_"),
            ("lights_", "part2_vse_lights"),
            ("core_Data_accelSet", "core_Data_accelset_"),
        ],
        &[
            ("classification", "part2_suve_classification"),
            ("part2_spve_event_description", "part2_spve_event_desc"),
            ("part2_spve_tr_connection", "part2_spve_tr_conn"),
            ("part2_spve_tr_sspRights", "part2_spve_tr_ssprights"),
            ("events", "part2_vse_events"),
            ("part2_vse_pp_radiusOfCurve", "part2_vse_pp_radiusofcurve"),
            ("part2_vse_ph_crumbData_PathHistoryPoint", "part2_vse_ph_crumbdata"),
            ("part2_suve_cd_hpmsType", "part2_suve_cd_hpmstype"),
        ],
    ))
    .with_json_string_fields(&["part2_vse_ph_crumbdata"]);

    RuleSet::new(stream_name(Provider::Thea, MessageType::Bsm), fields)
        .with_extension(
            ExtensionRule::new(
                &["payload", "data", "partII", "SEQUENCE"],
                PayloadLayout::Variants,
                part2,
            )
            .with_entry_key("partII-Value"),
        )
        .with_steps(vec![
            PostStep::scaled_geo_point(
                "core_Data_position_lat",
                "core_Data_position_long",
                "core_Data_position",
                MICRODEGREE_SCALE,
            ),
            PostStep::pack_size("core_Data_size_width", "core_Data_size_length", "core_Data_size"),
            PostStep::unpack_flags("core_Data_brakes_wheelBrakes", &WHEEL_BRAKES),
        ])
}

pub fn tim() -> RuleSet {
    let fields = FieldRules::new(RenameRules::new(
        &[
            ("payload_data_TravelerInformation_dataFrames_traveler_dataframe_", "traveler_dataframe_"),
            ("payload_data_TravelerInformation_", "travelerinformation_"),
            ("traveler_dataframe_regions_GeographicalPath_description_path_", "traveler_dataframe_desc_"),
            ("traveler_dataframe_regions_GeographicalPath_", "traveler_dataframe_"),
            ("_SEQUENCE", "_sequence"),
            ("_msgId_roadSignID_position_", "_msgId_"),
            ("_msgId_roadSignID_", "_msgId_"),
        ],
        &[
            ("traveler_dataframe_desc_offset_xy_nodes_NodeXY", "traveler_dataframe_desc_nodes"),
            ("traveler_dataframe_description_path_scale", "traveler_dataframe_desc_scale"),
        ],
    ))
    .with_json_string_fields(&["SEQUENCE", "traveler_dataframe_desc_nodes", "itis"]);

    RuleSet::new(stream_name(Provider::Thea, MessageType::Tim), fields)
        .with_split(SplitRule::new(&[
            "payload",
            "data",
            "TravelerInformation",
            "dataFrames",
            "traveler_dataframe",
        ]))
        .with_steps(vec![PostStep::scaled_geo_point(
            "traveler_dataframe_msgId_lat",
            "traveler_dataframe_msgId_long",
            "traveler_dataframe_msgId_position",
            MICRODEGREE_SCALE,
        )])
}

pub fn spat() -> RuleSet {
    let fields = FieldRules::new(RenameRules::new(
        &[("payload_data_SPAT_intersections_IntersectionState_states_", "")],
        &[],
    ))
    .with_json_string_fields(&["MovementState"]);

    RuleSet::new(stream_name(Provider::Thea, MessageType::Spat), fields)
}
